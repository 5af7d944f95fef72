//! sqlagent CLI entry point

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use sqlagent::config::{Config, Profile};
use sqlagent::driver::{self, Mode};
use sqlagent::logging::{self, LogOptions};
use sqlagent::mcp::Transport;
use sqlagent::prompts;
use sqlagent::session::SessionController;
use sqlagent::ui;

#[derive(Parser)]
#[command(name = "sqlagent")]
#[command(about = "Ask questions of a SQL database through an MCP tool server")]
#[command(version)]
struct Cli {
    /// Model to use: an alias (claude, gemini), provider:model, or a model id
    model: String,

    /// Prompt file, or directory of prompt files run in name order
    prompt_path: Option<PathBuf>,

    /// MCP server URL (overrides MCP_URL / MCP_SERVER_URL)
    #[arg(long)]
    mcp_url: Option<String>,

    /// MCP transport; inferred from the URL when omitted
    #[arg(long, value_enum)]
    transport: Option<Transport>,

    /// Ask a single question and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Agent profile: instruction text and default endpoint
    #[arg(long, value_enum, conflicts_with = "config")]
    profile: Option<Profile>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// File with instructions replacing the profile's
    #[arg(long)]
    instructions: Option<PathBuf>,

    /// Usage log path (overrides MCP_USAGE_LOG_PATH)
    #[arg(long)]
    usage_log: Option<PathBuf>,

    /// Do not write the usage log
    #[arg(long, conflicts_with = "usage_log")]
    no_usage_log: bool,

    /// Debug log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Maximum model round-trips per query
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Failed tool calls tolerated per query
    #[arg(long)]
    tool_retries: Option<usize>,

    /// MCP request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Leave the current date and time out of the system prompt
    #[arg(long)]
    no_datetime: bool,

    /// Verbose output on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", ui::error_line(&format!("{e:#}")));
            1
        }
    };

    // Exit directly: a blocking stdin read may still be parked on the
    // runtime's blocking pool.
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;

    let log = logging::init(&LogOptions {
        log_file: config.log_file.clone(),
        verbose: cli.verbose,
        profile: config.profile,
        model: config.model.clone(),
    })?;

    let batch = match (&cli.prompt, &cli.prompt_path) {
        (None, Some(path)) => Some(prompts::load_prompts(path)?),
        (Some(_), Some(path)) => {
            warn!("--prompt given, ignoring prompt path {}", path.display());
            None
        }
        _ => None,
    };
    let mode = Mode::select(cli.prompt.clone(), batch)?;

    let mut controller = SessionController::initialize(&config, log)
        .await
        .with_context(|| format!("Failed to start agent with MCP server at {}", config.mcp_url))?;

    ui::print_header(&config.model, &config.mcp_url, config.profile.display_name());

    let mut stdout = io::stdout();
    let outcome = match mode {
        Mode::SingleShot(prompt) => tokio::select! {
            result = driver::run_single(&mut controller, &prompt, &mut stdout) => {
                result.context("Query failed")
            }
            _ = interrupted() => Ok(()),
        },
        Mode::Batch(batch) => tokio::select! {
            result = driver::run_batch(&mut controller, &batch, &mut stdout) => {
                result.map(|summary| {
                    info!(
                        succeeded = summary.succeeded,
                        failed = summary.failed.len(),
                        "All prompts processed"
                    );
                }).map_err(Into::into)
            }
            _ = interrupted() => Ok(()),
        },
        Mode::Interactive => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            driver::run_interactive(&mut controller, stdin, &mut stdout, interrupted())
                .await
                .map(|reason| debug!(?reason, "Interactive session ended"))
                .map_err(Into::into)
        }
    };

    controller.shutdown().await;
    outcome
}

/// Profile defaults (or a config file), then environment, then flags.
fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::for_profile(cli.profile.unwrap_or(Profile::Clickhouse)),
    };
    config.apply_env();

    config.model = cli.model.clone();
    if let Some(ref url) = cli.mcp_url {
        config.mcp_url = url.clone();
    }
    if cli.transport.is_some() {
        config.transport = cli.transport;
    }
    if let Some(ref path) = cli.instructions {
        config.load_instructions(path)?;
    }
    if cli.no_usage_log {
        config.usage_log = None;
    } else if let Some(ref path) = cli.usage_log {
        config.usage_log = Some(path.clone());
    }
    if let Some(ref path) = cli.log_file {
        config.log_file = path.clone();
    }
    if let Some(n) = cli.max_iterations {
        config.max_iterations = n;
    }
    if let Some(n) = cli.tool_retries {
        config.tool_retries = n;
    }
    if let Some(secs) = cli.timeout {
        config.mcp_timeout_secs = secs;
    }
    if cli.no_datetime {
        config.add_datetime = false;
    }

    Ok(config)
}

/// Resolves on Ctrl+C. If the handler cannot be installed, never resolves.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
