//! sqlagent - natural-language questions over a SQL MCP tool server
//!
//! This library provides the pieces of the `sqlagent` binary: model
//! clients, the MCP toolset, the session controller and the drivers for
//! single-shot, batch and interactive use.

pub mod agent;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod prompts;
pub mod session;
pub mod tools;
pub mod ui;
pub mod usage;

pub use error::{Error, Result};
