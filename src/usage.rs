//! Usage accounting and the append-only usage log.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::Result;

/// Token and request counters for one query, summed over every model
/// request the query needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub requests: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
    pub tool_calls: usize,
}

impl Usage {
    /// Usage of a single model request as reported by a provider.
    pub fn request(input_tokens: usize, output_tokens: usize, total_tokens: usize) -> Self {
        let total_tokens = if total_tokens == 0 {
            input_tokens + output_tokens
        } else {
            total_tokens
        };
        Self {
            requests: 1,
            input_tokens,
            output_tokens,
            total_tokens,
            tool_calls: 0,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.requests += rhs.requests;
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.total_tokens += rhs.total_tokens;
        self.tool_calls += rhs.tool_calls;
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Usage(requests={}, input_tokens={}, output_tokens={}, total_tokens={}, tool_calls={})",
            self.requests, self.input_tokens, self.output_tokens, self.total_tokens, self.tool_calls
        )
    }
}

/// Serialize a usage value into a JSON object. Anything that does not
/// serialize to an object is kept as its debug representation.
pub fn usage_to_json<U: Serialize + fmt::Debug>(usage: &U) -> Value {
    match serde_json::to_value(usage) {
        Ok(value @ Value::Object(_)) => value,
        _ => json!({ "usage_repr": format!("{:?}", usage) }),
    }
}

/// One line of the usage log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    /// UNIX time in seconds
    pub timestamp: f64,
    pub model: String,
    pub query: String,
    pub duration_seconds: f64,
    pub usage: Value,
}

impl QueryRecord {
    pub fn new<U: Serialize + fmt::Debug>(
        model: &str,
        query: &str,
        duration: Duration,
        usage: &U,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
            model: model.to_string(),
            query: query.to_string(),
            duration_seconds: duration.as_secs_f64(),
            usage: usage_to_json(usage),
        }
    }
}

/// Append-only JSON-lines log of completed queries.
#[derive(Debug, Clone)]
pub struct UsageLog {
    path: PathBuf,
}

impl UsageLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line.
    pub fn append(&self, record: &QueryRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
