//! Agent module - core agent logic.
//!
//! This module contains:
//! - Message types (Message, Response)
//! - Model name resolution
//! - LLM client trait and implementations
//! - Agent loop for processing messages
//! - Context builder for prompts
//!
//! # Adding a New LLM Provider
//!
//! See [`llm::ProviderRegistry`] for instructions.

mod context;
mod loop_impl;
mod message;
pub mod model;

// LLM providers in submodule
pub mod llm;

// Re-exports for convenience
pub use context::Context;
pub use llm::{LlmClient, LlmResponse, ProviderRegistry};
pub use loop_impl::AgentLoop;
pub use message::{Message, Response, Role, ToolCallRequest};
pub use model::{ModelSpec, Provider};
