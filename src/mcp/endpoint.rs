//! Tool endpoint addressing

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::Result;

/// How the MCP server is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    /// Single endpoint, JSON or event-stream responses per POST
    StreamableHttp,
    /// Legacy HTTP+SSE: long-lived event stream plus a POST endpoint
    Sse,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::StreamableHttp => f.write_str("streamable-http"),
            Transport::Sse => f.write_str("sse"),
        }
    }
}

/// A URL plus the transport used to reach it. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolEndpoint {
    url: Url,
    transport: Transport,
}

impl ToolEndpoint {
    /// Parse an endpoint. Without an explicit transport, a path ending in
    /// `/sse` selects the legacy SSE transport.
    pub fn parse(url: &str, transport: Option<Transport>) -> Result<Self> {
        let url = Url::parse(url.trim())
            .map_err(|e| Error::Config(format!("Invalid MCP URL '{}': {}", url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "MCP URL must be http or https, got '{}'",
                url.scheme()
            )));
        }

        let transport = transport.unwrap_or_else(|| {
            if url.path().trim_end_matches('/').ends_with("/sse") {
                Transport::Sse
            } else {
                Transport::StreamableHttp
            }
        });

        Ok(Self { url, transport })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }
}

impl fmt::Display for ToolEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.transport)
    }
}
