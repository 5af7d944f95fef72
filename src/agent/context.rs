//! Context builder for agent prompts.
//!
//! - Instructions fixed at construction time
//! - History windowing (max N messages)
//! - Tool list taken from the connected executor

use std::sync::Arc;

use crate::tools::{ToolDefinition, ToolExecutor};

use super::message::Message;

/// Maximum history messages to include in prompt (prevents unbounded growth).
const MAX_HISTORY_MESSAGES: usize = 40;

/// Context holds the fixed state of an agent session.
#[derive(Clone)]
pub struct Context {
    pub instructions: String,
    pub tools: Arc<dyn ToolExecutor>,
    /// Add a "Current Time" section to the system prompt
    pub add_datetime: bool,
}

impl Context {
    pub fn new(instructions: impl Into<String>, tools: Arc<dyn ToolExecutor>, add_datetime: bool) -> Self {
        Self {
            instructions: instructions.into(),
            tools,
            add_datetime,
        }
    }

    /// Create a test context with no tools.
    #[cfg(test)]
    pub fn test() -> Self {
        Self::new(
            "Answer with SQL.",
            Arc::new(crate::tools::StaticTools::empty()),
            false,
        )
    }

    /// Tool definitions advertised to the model.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    /// Build the system prompt from instructions, time and tool list.
    pub fn build_system_prompt(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        parts.push(self.instructions.clone());

        if self.add_datetime {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z (%A)");
            parts.push(format!("## Current Time\n{now}"));
        }

        let tools = self.tools.definitions();
        if !tools.is_empty() {
            let listing: Vec<String> = tools
                .iter()
                .map(|t| {
                    let summary = t.description.lines().next().unwrap_or_default();
                    format!("- `{}` - {}", t.name, summary)
                })
                .collect();
            parts.push(format!("## Tools\nYou have access to these tools:\n{}", listing.join("\n")));
        }

        parts.join("\n\n")
    }

    /// Build messages list for LLM call with history windowing.
    pub fn build_messages(&self, history: &[Message], current: &str) -> Vec<Message> {
        let windowed_history = if history.len() > MAX_HISTORY_MESSAGES {
            &history[history.len() - MAX_HISTORY_MESSAGES..]
        } else {
            history
        };

        let mut messages = Vec::with_capacity(windowed_history.len() + 2);
        messages.push(Message::system(self.build_system_prompt()));
        messages.extend(windowed_history.iter().cloned());
        messages.push(Message::user(current));

        messages
    }
}
