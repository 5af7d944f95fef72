//! The session's single MCP connection.

use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParam, ClientCapabilities, ClientInfo, Content, Implementation,
    InitializeRequestParam, RawContent, Tool,
};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::{SseClientTransport, StreamableHttpClientTransport};
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::tools::{ToolDefinition, ToolExecutor};
use crate::Result;

use super::endpoint::{ToolEndpoint, Transport};
use super::{join_text, CLIENT_NAME};

type ClientService = RunningService<RoleClient, InitializeRequestParam>;

/// Tools advertised by one MCP server, plus the live connection used to
/// call them.
///
/// The connection is made in [`McpToolset::connect`] and released by
/// [`McpToolset::shutdown`]; dropping the toolset also tears it down.
pub struct McpToolset {
    endpoint: ToolEndpoint,
    tools: Vec<ToolDefinition>,
    peer: Peer<RoleClient>,
    service: Mutex<Option<ClientService>>,
    timeout: Duration,
}

impl McpToolset {
    /// Connect, handshake and fetch the tool list. Any failure here is a
    /// [`Error::Connection`].
    pub async fn connect(endpoint: ToolEndpoint, timeout: Duration) -> Result<Self> {
        info!("Connecting to MCP server at {}", endpoint);
        let uri = endpoint.url().as_str().to_string();

        let service = match endpoint.transport() {
            Transport::StreamableHttp => {
                let transport = StreamableHttpClientTransport::from_uri(uri);
                tokio::time::timeout(timeout, client_info().serve(transport))
                    .await
                    .map_err(|_| connection_error(&endpoint, "handshake timed out"))?
                    .map_err(|e| connection_error(&endpoint, e))?
            }
            Transport::Sse => {
                let transport = tokio::time::timeout(timeout, SseClientTransport::start(uri))
                    .await
                    .map_err(|_| connection_error(&endpoint, "no endpoint event"))?
                    .map_err(|e| connection_error(&endpoint, e))?;
                tokio::time::timeout(timeout, client_info().serve(transport))
                    .await
                    .map_err(|_| connection_error(&endpoint, "handshake timed out"))?
                    .map_err(|e| connection_error(&endpoint, e))?
            }
        };

        let peer = service.peer().clone();
        let tools = tokio::time::timeout(timeout, peer.list_all_tools())
            .await
            .map_err(|_| connection_error(&endpoint, "tools/list timed out"))?
            .map_err(|e| connection_error(&endpoint, format!("tools/list failed: {e}")))?;
        let tools: Vec<ToolDefinition> = tools.iter().map(convert_tool).collect();

        info!(
            "MCP server connected with {} tools: {}",
            tools.len(),
            tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        Ok(Self {
            endpoint,
            tools,
            peer,
            service: Mutex::new(Some(service)),
            timeout,
        })
    }

    /// Close the connection. Later calls fail.
    pub async fn shutdown(&self) {
        if let Some(service) = self.service.lock().await.take() {
            if let Err(e) = service.cancel().await {
                warn!("MCP service did not stop cleanly: {}", e);
            }
        }
        debug!("MCP connection to {} closed", self.endpoint);
    }
}

#[async_trait]
impl ToolExecutor for McpToolset {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.clone()
    }

    async fn execute(&self, name: &str, params: Value) -> Result<String> {
        if !self.tools.iter().any(|t| t.name == name) {
            return Err(Error::Tool(format!("Unknown tool: {}", name)));
        }
        let arguments = into_arguments(params)?;

        let call = self.peer.call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments: Some(arguments),
        });
        let result = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| Error::Tool(format!("{} timed out after {:?}", name, self.timeout)))?
            .map_err(|e| Error::Tool(format!("{} failed: {}", name, e)))?;

        let text = extract_text(&result.content, result.structured_content.as_ref());
        if result.is_error == Some(true) {
            Err(Error::Tool(text))
        } else {
            Ok(text)
        }
    }
}

fn client_info() -> ClientInfo {
    ClientInfo {
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: CLIENT_NAME.to_string(),
            title: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

fn connection_error(endpoint: &ToolEndpoint, reason: impl std::fmt::Display) -> Error {
    Error::Connection(format!("{}: {}", endpoint, reason))
}

fn convert_tool(tool: &Tool) -> ToolDefinition {
    ToolDefinition {
        name: tool.name.to_string(),
        description: tool
            .description
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default(),
        parameters: Value::Object(tool.input_schema.as_ref().clone()),
    }
}

fn extract_text(content: &[Content], structured: Option<&Value>) -> String {
    join_text(
        content.iter().filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        }),
        structured,
    )
}

/// Tool arguments must be a JSON object; a missing argument set is empty.
fn into_arguments(params: Value) -> Result<Map<String, Value>> {
    match params {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(Error::Tool(format!(
            "Tool arguments must be a JSON object, got {}",
            other
        ))),
    }
}
