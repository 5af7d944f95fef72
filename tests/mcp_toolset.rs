//! McpToolset against in-process rmcp servers, over both transports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::transport::sse_server::{SseServer, SseServerConfig};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use sqlagent::mcp::{McpToolset, ToolEndpoint, Transport};
use sqlagent::tools::ToolExecutor;
use sqlagent::Error;

// ============================================================================
// Test Server Infrastructure
// ============================================================================

/// A tiny SQL tool server: two tools, and a query error for `missing_table`.
#[derive(Clone)]
struct SqlTools;

impl ServerHandler for SqlTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sql-tools".to_string(),
                title: None,
                version: "0.0.1".to_string(),
                website_url: None,
                icons: None,
            },
            instructions: None,
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let empty = json!({"type": "object", "properties": {}});
        let query = json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        });
        Ok(ListToolsResult::with_all_items(vec![
            Tool::new(
                "list_databases",
                "List available databases",
                empty.as_object().cloned().unwrap_or_default(),
            ),
            Tool::new(
                "run_select_query",
                "Run a read-only SQL query",
                query.as_object().cloned().unwrap_or_default(),
            ),
        ]))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let query = request
            .arguments
            .as_ref()
            .and_then(|args| args.get("query"))
            .and_then(|q| q.as_str())
            .unwrap_or_default()
            .to_string();

        match request.name.as_ref() {
            "list_databases" => Ok(CallToolResult::success(vec![
                Content::text("default"),
                Content::text("system"),
            ])),
            "run_select_query" if query.contains("missing_table") => Ok(CallToolResult::error(
                vec![Content::text("Table default.missing_table does not exist")],
            )),
            "run_select_query" => Ok(CallToolResult::success(vec![Content::text(format!(
                "1 row for: {}",
                query
            ))])),
            other => Err(McpError::invalid_params(format!("no tool {}", other), None)),
        }
    }
}

async fn bind() -> (tokio::net::TcpListener, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

async fn start_streamable() -> String {
    let (listener, addr) = bind().await;
    let service = StreamableHttpService::new(
        || Ok(SqlTools),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig::default(),
    );
    let router = axum::Router::new().nest_service("/mcp", service);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}/mcp", addr)
}

async fn start_sse() -> (String, CancellationToken) {
    let (listener, addr) = bind().await;
    let (server, router) = SseServer::new(SseServerConfig {
        bind: addr,
        sse_path: "/sse".to_string(),
        post_path: "/message".to_string(),
        ct: CancellationToken::new(),
        sse_keep_alive: None,
    });

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    let ct = server.with_service(|| SqlTools);

    (format!("http://{}/sse", addr), ct)
}

async fn connect(url: &str) -> McpToolset {
    let endpoint = ToolEndpoint::parse(url, None).unwrap();
    McpToolset::connect(endpoint, Duration::from_secs(30))
        .await
        .unwrap()
}

/// The whole toolset lifecycle, identical for both transports.
async fn exercise(toolset: McpToolset) {
    let names: Vec<String> = toolset.definitions().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["list_databases", "run_select_query"]);
    let schema = &toolset.definitions()[1].parameters;
    assert_eq!(schema["required"], json!(["query"]));

    let text = toolset
        .execute("list_databases", json!({}))
        .await
        .unwrap();
    assert_eq!(text, "default\nsystem");

    let text = toolset
        .execute("run_select_query", json!({"query": "SELECT 1"}))
        .await
        .unwrap();
    assert_eq!(text, "1 row for: SELECT 1");

    match toolset
        .execute("run_select_query", json!({"query": "SELECT * FROM missing_table"}))
        .await
    {
        Err(Error::Tool(msg)) => assert!(msg.contains("does not exist")),
        other => panic!("expected a tool error, got {:?}", other),
    }

    assert!(matches!(
        toolset.execute("drop_database", json!({})).await,
        Err(Error::Tool(_))
    ));

    toolset.shutdown().await;

    // A closed connection fails immediately instead of waiting out the timeout.
    let after = tokio::time::timeout(
        Duration::from_secs(5),
        toolset.execute("list_databases", json!({})),
    )
    .await
    .expect("call on a closed toolset should not hang");
    assert!(matches!(after, Err(Error::Tool(_))));
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_streamable_http_toolset() {
    let url = start_streamable().await;
    let toolset = connect(&url).await;
    exercise(toolset).await;
}

#[tokio::test]
async fn test_sse_toolset() {
    let (url, ct) = start_sse().await;
    let endpoint = ToolEndpoint::parse(&url, None).unwrap();
    assert_eq!(endpoint.transport(), Transport::Sse);

    let toolset = connect(&url).await;
    exercise(toolset).await;
    ct.cancel();
}

#[tokio::test]
async fn test_shutdown_twice_is_harmless() {
    let url = start_streamable().await;
    let toolset = connect(&url).await;
    toolset.shutdown().await;
    toolset.shutdown().await;
}

#[tokio::test]
async fn test_wrong_path_is_connection_error() {
    let url = start_streamable().await.replace("/mcp", "/nothing");
    let endpoint = ToolEndpoint::parse(&url, None).unwrap();
    let result = McpToolset::connect(endpoint, Duration::from_secs(5)).await;
    assert!(matches!(result, Err(Error::Connection(_))));
}
