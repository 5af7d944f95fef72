//! Gemini LLM client implementation (API key authentication).

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

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Schema keywords the Gemini function-declaration API rejects.
const UNSUPPORTED_SCHEMA_KEYS: [&str; 4] = ["$schema", "additionalProperties", "title", "default"];

/// Gemini API client using API key authentication.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiClient {
    /// Create a new Gemini client with API key.
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: Client::new(),
        }
    }

    fn build_url(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_URL, self.model)
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .filter(|m| m.role != Role::System)
            .filter(|m| {
                // Empty model turns are rejected.
                !(m.role == Role::Assistant && m.tool_calls.is_none() && m.content.trim().is_empty())
            })
            .map(|m| {
                if m.role == Role::Tool {
                    json!({
                        "role": "user",
                        "parts": [{
                            "functionResponse": {
                                "name": m.tool_name.as_deref().unwrap_or("unknown"),
                                "response": {"result": m.content}
                            }
                        }]
                    })
                } else if let Some(ref tool_calls) = m.tool_calls {
                    let mut parts: Vec<Value> = Vec::with_capacity(tool_calls.len() + 1);
                    if !m.content.is_empty() {
                        parts.push(json!({"text": m.content}));
                    }
                    parts.extend(tool_calls.iter().map(|tc| {
                        json!({
                            "functionCall": {
                                "name": tc.name,
                                "args": tc.arguments
                            }
                        })
                    }));

                    json!({
                        "role": "model",
                        "parts": parts
                    })
                } else {
                    let role = if m.role == Role::Assistant { "model" } else { "user" };
                    json!({
                        "role": role,
                        "parts": [{"text": m.content}]
                    })
                }
            })
            .collect()
    }

    fn get_system_instruction(&self, messages: &[Message]) -> Option<String> {
        messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
    }

    fn convert_tools(&self, tools: &[ToolDefinition]) -> Option<Value> {
        if tools.is_empty() {
            return None;
        }

        let function_declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": sanitize_schema(&t.parameters)
                })
            })
            .collect();

        Some(json!([{
            "functionDeclarations": function_declarations
        }]))
    }

    fn parse_response(&self, response: &GeminiResponse) -> Result<LlmResponse> {
        let candidate = response
            .candidates
            .first()
            .ok_or_else(|| Error::Llm("No candidates in response".to_string()))?;

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();

        for part in candidate.content.iter().flat_map(|c| c.parts.iter()) {
            if let Some(ref text) = part.text {
                texts.push(text.as_str());
            }

            if let Some(ref fc) = part.function_call {
                tool_calls.push(ToolCallRequest {
                    id: format!("tc_{}", tool_calls.len()),
                    name: fc.name.clone(),
                    arguments: fc.args.clone().unwrap_or_else(|| json!({})),
                });
            }
        }

        let usage = response
            .usage_metadata
            .as_ref()
            .map(|u| {
                Usage::request(
                    u.prompt_token_count.unwrap_or(0),
                    u.candidates_token_count.unwrap_or(0),
                    u.total_token_count.unwrap_or(0),
                )
            })
            .unwrap_or_else(|| Usage::request(0, 0, 0));

        Ok(LlmResponse {
            content: (!texts.is_empty()).then(|| texts.concat()),
            tool_calls,
            finish_reason: candidate
                .finish_reason
                .clone()
                .unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse> {
        let contents = self.convert_messages(messages);
        let system_instruction = self.get_system_instruction(messages);

        let mut request = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": 0.2,
                "maxOutputTokens": 8192
            }
        });

        if let Some(system) = system_instruction {
            request["systemInstruction"] = json!({
                "parts": [{"text": system}]
            });
        }

        if let Some(tool_config) = self.convert_tools(tools) {
            request["tools"] = tool_config;
        }

        let response = self
            .client
            .post(self.build_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(Error::Llm(format!("Gemini API error: {error_text}")));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        self.parse_response(&gemini_response)
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

/// Strip schema keywords Gemini does not accept, recursively.
fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&k.as_str()))
                .map(|(k, v)| {
                    // Property names are user data, not keywords.
                    if k == "properties" {
                        if let Value::Object(props) = v {
                            let props = props
                                .iter()
                                .map(|(name, s)| (name.clone(), sanitize_schema(s)))
                                .collect();
                            return (k.clone(), Value::Object(props));
                        }
                    }
                    (k.clone(), sanitize_schema(v))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

// Gemini API response types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<usize>,
    candidates_token_count: Option<usize>,
    total_token_count: Option<usize>,
}
