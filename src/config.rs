//! Configuration management
//!
//! Settings are layered: profile defaults, then an optional JSON config
//! file, then environment variables, then command-line flags (applied by
//! the binary). Environment is read exactly once, at startup.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::mcp::Transport;
use crate::Result;

/// Built-in agent profiles. Each one fixes the instruction text and the
/// default tool endpoint for one kind of SQL backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// ClickHouse server reached through mcp-clickhouse
    Clickhouse,
    /// Embedded chDB reading compressed JSON logs
    Chdb,
    /// DuckDB / MotherDuck server
    Duckdb,
}

impl Profile {
    /// Short lowercase name, also used for default file names.
    pub fn name(self) -> &'static str {
        match self {
            Profile::Clickhouse => "clickhouse",
            Profile::Chdb => "chdb",
            Profile::Duckdb => "duckdb",
        }
    }

    /// Human readable backend name for prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Profile::Clickhouse => "ClickHouse",
            Profile::Chdb => "chDB",
            Profile::Duckdb => "DuckDB",
        }
    }

    pub fn default_mcp_url(self) -> &'static str {
        match self {
            Profile::Clickhouse => "http://localhost:8989/mcp",
            Profile::Chdb => "http://localhost:8000/mcp",
            Profile::Duckdb => "http://127.0.0.1:8000/mcp",
        }
    }

    pub fn instructions(self) -> &'static str {
        match self {
            Profile::Clickhouse => {
                "Query the table specified in the prompt looking for security events by \
                 creating ClickHouse SQL queries using the ClickHouse MCP Server.\n\
                 Show both the query and the results."
            }
            Profile::Chdb => {
                "Using file('/tmp/mcp/data/**/*.log.gz', 'JSONEachRow') as a data source you \
                 will find JSON compressed files for multiple events captured from Linux systems.\n\
                 Answer by creating ClickHouse SQL queries using the ClickHouse MCP Server. \
                 Only show me the results not the queries themselves."
            }
            Profile::Duckdb => {
                "You are a data analyst. You will be asked to analyze data from a DuckDB database.\n\
                 You can use the MotherDuck MCP Server to execute SQL queries.\n\
                 Only show me the results not the queries themselves."
            }
        }
    }

    pub fn default_log_file(self) -> PathBuf {
        PathBuf::from(format!("{}-agent.log", self.name()))
    }

    pub fn default_usage_log(self) -> PathBuf {
        PathBuf::from(format!("{}-agent-usage.jsonl", self.name()))
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_profile")]
    pub profile: Profile,

    /// Model name as typed by the user (see `agent::ModelSpec`)
    #[serde(default)]
    pub model: String,

    /// Tool endpoint URL
    #[serde(default)]
    pub mcp_url: String,

    /// Transport override; inferred from the URL when unset
    #[serde(default)]
    pub transport: Option<Transport>,

    /// Per-request timeout for the tool endpoint
    #[serde(default = "default_mcp_timeout_secs")]
    pub mcp_timeout_secs: u64,

    /// Fixed instruction text given to the agent
    #[serde(default)]
    pub instructions: String,

    /// Maximum model round-trips per query
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Failed tool calls tolerated per query
    #[serde(default = "default_tool_retries")]
    pub tool_retries: usize,

    /// Append-only JSONL usage log; `None` disables it (`--no-usage-log`)
    #[serde(default)]
    pub usage_log: Option<PathBuf>,

    /// Free-text debug log file
    #[serde(default)]
    pub log_file: PathBuf,

    /// Put the current date and time into the system prompt
    #[serde(default = "default_true")]
    pub add_datetime: bool,

    #[serde(default)]
    pub providers: ProviderConfig,
}

/// Provider credentials and endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub gemini_api_key: String,

    #[serde(default)]
    pub openai_api_key: String,

    #[serde(default)]
    pub openai_base_url: Option<String>,

    #[serde(default)]
    pub anthropic_api_key: String,

    /// OpenAI-compatible Ollama endpoint, e.g. `http://1.2.3.4:11434/v1`
    #[serde(default)]
    pub ollama_base_url: Option<String>,
}

fn default_profile() -> Profile {
    Profile::Clickhouse
}

fn default_mcp_timeout_secs() -> u64 {
    60
}

fn default_max_iterations() -> usize {
    20
}

fn default_tool_retries() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self::for_profile(default_profile())
    }
}

impl Config {
    /// Defaults for a profile, before env and CLI overrides.
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            profile,
            model: String::new(),
            mcp_url: profile.default_mcp_url().to_string(),
            transport: None,
            mcp_timeout_secs: default_mcp_timeout_secs(),
            instructions: profile.instructions().to_string(),
            max_iterations: default_max_iterations(),
            tool_retries: default_tool_retries(),
            usage_log: Some(profile.default_usage_log()),
            log_file: profile.default_log_file(),
            add_datetime: true,
            providers: ProviderConfig::default(),
        }
    }

    /// Load a JSON config file. Missing fields fall back to the profile
    /// named in the file (or the default profile).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!("Config not found at {:?}", path)));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.fill_profile_defaults();
        Ok(config)
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("MCP_URL").or_else(|| get("MCP_SERVER_URL")) {
            self.mcp_url = url;
        }
        if let Some(path) = get("MCP_USAGE_LOG_PATH") {
            self.usage_log = Some(PathBuf::from(path));
        }

        let p = &mut self.providers;
        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            p.gemini_api_key = key;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            p.openai_api_key = key;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            p.openai_base_url = Some(url);
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            p.anthropic_api_key = key;
        }
        if let Some(url) = get("OLLAMA_BASE_URL") {
            p.ollama_base_url = Some(url);
        } else if let Some(host) = get("OLLAMA_HOST") {
            p.ollama_base_url = Some(ollama_base_from_host(&host));
        }
    }

    /// Replace a profile's instruction text with the contents of a file.
    pub fn load_instructions(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Config(format!("Instructions file {:?} is empty", path)));
        }
        self.instructions = text.to_string();
        Ok(())
    }

    pub fn mcp_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.mcp_timeout_secs)
    }

    fn fill_profile_defaults(&mut self) {
        if self.mcp_url.is_empty() {
            self.mcp_url = self.profile.default_mcp_url().to_string();
        }
        if self.instructions.is_empty() {
            self.instructions = self.profile.instructions().to_string();
        }
        if self.log_file.as_os_str().is_empty() {
            self.log_file = self.profile.default_log_file();
        }
        if self.usage_log.is_none() {
            self.usage_log = Some(self.profile.default_usage_log());
        }
    }
}

/// `OLLAMA_HOST` is `host:port`; the OpenAI-compatible API lives under `/v1`.
fn ollama_base_from_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    let base = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    if base.ends_with("/v1") {
        base
    } else {
        format!("{base}/v1")
    }
}
