//! Logging setup.
//!
//! `init` is called once by the binary. It installs a subscriber with two
//! layers: terse stderr output and a debug log file, and returns the
//! [`LogContext`] the session controller runs every query under.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Span;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use crate::config::Profile;
use crate::error::Error;
use crate::Result;

/// Stderr filter without `-v`.
const QUIET_FILTER: &str = "warn";
/// Stderr filter with `-v`.
const VERBOSE_FILTER: &str = "sqlagent=debug,info";
/// The debug log always records this crate at debug level.
const FILE_FILTER: &str = "sqlagent=debug,rmcp=debug,info";

/// What the binary knows about logging at startup.
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub log_file: PathBuf,
    pub verbose: bool,
    pub profile: Profile,
    pub model: String,
}

/// Handle to the logging setup, passed explicitly to the controller.
#[derive(Debug, Clone)]
pub struct LogContext {
    span: Span,
}

impl LogContext {
    /// The `session` span every query runs in.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// A context with no subscriber behind it.
    pub fn detached() -> Self {
        Self { span: Span::none() }
    }
}

/// Install the global subscriber. `RUST_LOG` replaces the stderr filter.
pub fn init(options: &LogOptions) -> Result<LogContext> {
    let file = open_log_file(&options.log_file)?;

    let stderr_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if options.verbose { VERBOSE_FILTER } else { QUIET_FILTER })
    });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_filter(EnvFilter::new(FILE_FILTER));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))?;

    let span = tracing::info_span!(
        "session",
        profile = %options.profile,
        model = %options.model,
        id = tracing::field::Empty,
    );

    tracing::debug!(log_file = %options.log_file.display(), "Logging initialized");

    Ok(LogContext { span })
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}
