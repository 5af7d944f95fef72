//! Model Context Protocol tool endpoint.
//!
//! One [`McpToolset`] owns the single connection to the SQL tool server for
//! the lifetime of a session:
//!
//! - **streamable HTTP** through `rmcp`'s `StreamableHttpClientTransport`
//! - **legacy SSE** (`/sse` endpoints) through `rmcp`'s `SseClientTransport`
//!
//! ```ignore
//! let endpoint = ToolEndpoint::parse("http://localhost:8000/mcp", None)?;
//! let toolset = McpToolset::connect(endpoint, Duration::from_secs(60)).await?;
//! let rows = toolset.execute("run_select_query", json!({"query": "SELECT 1"})).await?;
//! toolset.shutdown().await;
//! ```

mod endpoint;
mod toolset;

pub use endpoint::{ToolEndpoint, Transport};
pub use toolset::McpToolset;

/// Client name sent to the server during the handshake.
pub(crate) const CLIENT_NAME: &str = "sqlagent";

/// Join the text parts of a tool result. Falls back to structured content
/// when the server returned no text.
pub(crate) fn join_text<'a>(
    texts: impl Iterator<Item = &'a str>,
    structured: Option<&serde_json::Value>,
) -> String {
    let text = texts.collect::<Vec<_>>().join("\n");
    if text.is_empty() {
        if let Some(value) = structured {
            return value.to_string();
        }
    }
    text
}
