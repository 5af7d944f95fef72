//! Agent loop - core message processing

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::usage::Usage;
use crate::Result;

use super::context::Context;
use super::llm::LlmClient;
use super::message::{Message, Response, ToolCallRequest};

/// The agent loop processes messages through LLM and tool execution
pub struct AgentLoop<C: LlmClient> {
    client: C,
    max_iterations: usize,
    tool_retries: usize,
}

impl<C: LlmClient> AgentLoop<C> {
    /// Create a new agent loop
    pub fn new(client: C, max_iterations: usize, tool_retries: usize) -> Self {
        Self {
            client,
            max_iterations,
            tool_retries,
        }
    }

    /// Run the agent loop for a single message on top of earlier turns.
    pub async fn run(&self, history: &[Message], message: Message, ctx: &Context) -> Result<Response> {
        let mut messages = ctx.build_messages(history, &message.content);
        let tools = ctx.tool_definitions();
        let mut usage = Usage::default();
        let mut failures = 0usize;

        info!(
            model = self.client.default_model(),
            chars = message.content.len(),
            "Starting agent loop"
        );

        for iteration in 0..self.max_iterations {
            debug!("Iteration {}/{}", iteration + 1, self.max_iterations);

            let response = self.client.chat(&messages, &tools).await?;
            usage += response.usage;
            debug!(
                finish_reason = %response.finish_reason,
                tool_calls = response.tool_calls.len(),
                "Model responded"
            );

            if !response.has_tool_calls() {
                let content = response.content.unwrap_or_default();
                info!(
                    chars = content.len(),
                    requests = usage.requests,
                    tool_calls = usage.tool_calls,
                    "Agent completed"
                );
                return Ok(Response::new(content, usage));
            }

            messages.push(Message::assistant_with_tools(
                response.content.clone().unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            for tool_call in &response.tool_calls {
                usage.tool_calls += 1;
                let result = match self.execute_tool(ctx, tool_call).await {
                    Ok(result) => result,
                    Err(e) => {
                        failures += 1;
                        if failures > self.tool_retries {
                            warn!(failures, "Giving up after repeated tool failures");
                            return Err(Error::ToolRetriesExceeded(failures));
                        }
                        format!("Error: {}", e)
                    }
                };
                messages.push(Message::tool_result(tool_call, result));
            }
        }

        Err(Error::MaxIterations)
    }

    async fn execute_tool(&self, ctx: &Context, tool_call: &ToolCallRequest) -> Result<String> {
        debug!("Executing tool: {} with args: {}", tool_call.name, tool_call.arguments);

        match ctx.tools.execute(&tool_call.name, tool_call.arguments.clone()).await {
            Ok(result) => {
                debug!("Tool {} succeeded: {} chars", tool_call.name, result.len());
                Ok(result)
            }
            Err(e) => {
                debug!("Tool {} failed: {}", tool_call.name, e);
                Err(e)
            }
        }
    }
}
