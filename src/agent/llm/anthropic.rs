//! Anthropic Messages API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::usage::Usage;
use crate::Result;

use super::super::message::{Message, Role, ToolCallRequest};
use super::{LlmClient, LlmResponse};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

#[derive(Clone)]
pub struct AnthropicClient {
    api_key: String,
    model: String,
    client: Client,
}

impl AnthropicClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: Client::new(),
        }
    }

    fn system_prompt(&self, messages: &[Message]) -> Option<String> {
        let parts: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }

    /// Tool results must be sent back as a single user turn, so consecutive
    /// tool messages are merged.
    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        let mut out: Vec<Value> = Vec::with_capacity(messages.len());
        let mut pending_results: Vec<Value> = Vec::new();

        for m in messages.iter().filter(|m| m.role != Role::System) {
            if m.role == Role::Tool {
                pending_results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": m.tool_call_id.as_deref().unwrap_or_default(),
                    "content": m.content
                }));
                continue;
            }

            if !pending_results.is_empty() {
                out.push(json!({"role": "user", "content": std::mem::take(&mut pending_results)}));
            }

            match (&m.role, &m.tool_calls) {
                (Role::Assistant, Some(calls)) => {
                    let mut blocks: Vec<Value> = Vec::with_capacity(calls.len() + 1);
                    if !m.content.is_empty() {
                        blocks.push(json!({"type": "text", "text": m.content}));
                    }
                    blocks.extend(calls.iter().map(|tc| {
                        json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": tc.arguments
                        })
                    }));
                    out.push(json!({"role": "assistant", "content": blocks}));
                }
                (Role::Assistant, None) => {
                    // The API rejects empty assistant content.
                    if !m.content.trim().is_empty() {
                        out.push(json!({"role": "assistant", "content": m.content}));
                    }
                }
                _ => out.push(json!({"role": "user", "content": m.content})),
            }
        }

        if !pending_results.is_empty() {
            out.push(json!({"role": "user", "content": pending_results}));
        }

        out
    }

    fn convert_tools(&self, tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters
                })
            })
            .collect()
    }

    fn parse_response(&self, response: MessagesResponse) -> LlmResponse {
        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text } => texts.push(text),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCallRequest {
                    id,
                    name,
                    arguments: input,
                }),
                ContentBlock::Other => {}
            }
        }

        let usage = response
            .usage
            .map(|u| Usage::request(u.input_tokens, u.output_tokens, 0))
            .unwrap_or_else(|| Usage::request(0, 0, 0));

        LlmResponse {
            content: (!texts.is_empty()).then(|| texts.concat()),
            tool_calls,
            finish_reason: response.stop_reason.unwrap_or_else(|| "end_turn".to_string()),
            usage,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse> {
        let mut request = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": self.convert_messages(messages),
        });

        if let Some(system) = self.system_prompt(messages) {
            request["system"] = Value::String(system);
        }
        if !tools.is_empty() {
            request["tools"] = Value::Array(self.convert_tools(tools));
        }

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(Error::Llm(format!("Anthropic API error: {error_text}")));
        }

        let parsed: MessagesResponse = response.json().await?;
        Ok(self.parse_response(parsed))
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AnthropicClient {
        AnthropicClient::new("key", "claude-sonnet-4-20250514")
    }

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: "run_select_query".to_string(),
            arguments: json!({"query": "SELECT 1"}),
        }
    }

    #[test]
    fn test_empty_assistant_turn_dropped() {
        let messages = vec![
            Message::user("q"),
            Message::assistant(""),
            Message::user("again"),
            Message::assistant("3 rows"),
        ];

        let out = client().convert_messages(&messages);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0]["role"], "user");
        assert_eq!(out[1]["role"], "user");
        assert_eq!(out[2]["content"], "3 rows");
    }

    #[test]
    fn test_tool_results_are_merged() {
        let (a, b) = (call("toolu_a"), call("toolu_b"));
        let messages = vec![
            Message::system("rules"),
            Message::user("q"),
            Message::assistant_with_tools("checking", vec![a.clone(), b.clone()]),
            Message::tool_result(&a, "1"),
            Message::tool_result(&b, "2"),
        ];

        let converted = client().convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[1]["content"][0]["type"], "text");
        assert_eq!(converted[1]["content"][2]["id"], "toolu_b");
        assert_eq!(converted[2]["role"], "user");
        assert_eq!(converted[2]["content"].as_array().unwrap().len(), 2);
        assert_eq!(converted[2]["content"][1]["tool_use_id"], "toolu_b");

        assert_eq!(client().system_prompt(&messages).as_deref(), Some("rules"));
    }

    #[test]
    fn test_parse_response() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "Running it."},
                {"type": "tool_use", "id": "toolu_1", "name": "list_databases", "input": {}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 200, "output_tokens": 30}
        }))
        .unwrap();

        let parsed = client().parse_response(response);
        assert_eq!(parsed.content.as_deref(), Some("Running it."));
        assert_eq!(parsed.tool_calls[0].name, "list_databases");
        assert_eq!(parsed.usage.total_tokens, 230);
        assert_eq!(parsed.finish_reason, "tool_use");
    }

    #[test]
    fn test_convert_tools_uses_input_schema() {
        let tools = vec![ToolDefinition {
            name: "list_tables".to_string(),
            description: "List tables".to_string(),
            parameters: json!({"type": "object"}),
        }];
        let converted = client().convert_tools(&tools);
        assert_eq!(converted[0]["input_schema"]["type"], "object");
    }
}
