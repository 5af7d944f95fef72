//! Error types for sqlagent

use thiserror::Error;

/// Result type alias for sqlagent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sqlagent
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Max iterations reached")]
    MaxIterations,

    #[error("Tool calls failed {0} times, giving up")]
    ToolRetriesExceeded(usize),
}

impl Error {
    /// Errors raised while bringing a session up. These end the process;
    /// everything else fails a single query and the caller keeps going.
    pub fn is_startup(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Connection(_) | Error::Prompt(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_classification() {
        assert!(Error::Connection("refused".into()).is_startup());
        assert!(Error::Config("bad model".into()).is_startup());
        assert!(!Error::MaxIterations.is_startup());
        assert!(!Error::Llm("500".into()).is_startup());
    }
}
