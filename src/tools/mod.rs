//! Tools module - what the agent can call
//!
//! The agent never talks to a tool server directly; it sees a
//! [`ToolExecutor`] that lists tool definitions and runs calls by name.
//! The production executor is [`crate::mcp::McpToolset`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Tool definition for LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: Value,
}

/// A set of callable tools.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Tool definitions to advertise to the model
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Execute a tool by name
    async fn execute(&self, name: &str, params: Value) -> Result<String>;
}

/// Scripted tools for testing: every call to a known tool returns a fixed
/// result, unknown tools fail.
#[cfg(test)]
pub struct StaticTools {
    tools: Vec<(ToolDefinition, Result<String>)>,
    pub calls: std::sync::Mutex<Vec<(String, Value)>>,
}

#[cfg(test)]
impl StaticTools {
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, name: &str, result: Result<String>) -> Self {
        self.tools.push((
            ToolDefinition {
                name: name.to_string(),
                description: format!("Test tool {name}"),
                parameters: serde_json::json!({"type": "object"}),
            },
            result,
        ));
        self
    }
}

#[cfg(test)]
#[async_trait]
impl ToolExecutor for StaticTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|(d, _)| d.clone()).collect()
    }

    async fn execute(&self, name: &str, params: Value) -> Result<String> {
        self.calls.lock().unwrap().push((name.to_string(), params));
        match self.tools.iter().find(|(d, _)| d.name == name) {
            Some((_, Ok(text))) => Ok(text.clone()),
            Some((_, Err(e))) => Err(crate::error::Error::Tool(e.to_string())),
            None => Err(crate::error::Error::Tool(format!("Unknown tool: {}", name))),
        }
    }
}
