//! Terminal output helpers.

use std::time::Duration;

use colored::*;
use terminal_size::{terminal_size, Height, Width};

use crate::usage::Usage;

pub const EMPTY_QUERY_HINT: &str = "Query cannot be empty. Please enter a query.";
pub const INVALID_INPUT_HINT: &str = "Input is not valid UTF-8. Please enter the query again.";

pub fn print_header(model: &str, endpoint: &str, profile: &str) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let width = (width.0 as usize).min(100);

    let line = "─".repeat(width);
    println!("{}", line.black().bold());

    let name = "sqlagent".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  {} {}", name, version);

    let info = format!("  {}  •  {}", model, profile).cyan();
    println!("{}", info);
    println!("  {}", endpoint.black().bold());

    println!("{}", line.black().bold());
}

pub fn user_prompt() -> String {
    format!("{} ", ">".green().bold())
}

pub fn running_prompt(name: &str) -> String {
    format!("{}", format!("Running prompt '{}'", name).cyan())
}

pub fn completed(duration: Duration) -> String {
    format!("Completed in {:.3} seconds", duration.as_secs_f64())
}

pub fn usage_line(usage: &Usage) -> String {
    format!("{}", usage.to_string().black().bold())
}

pub fn prompt_error(name: &str, err: &dyn std::fmt::Display) -> String {
    format!("{}", format!("Error running prompt '{}': {}", name, err).red())
}

pub fn error_line(err: &dyn std::fmt::Display) -> String {
    format!("  {} {}", "❌".red().bold(), err.to_string().red())
}

pub fn hint(msg: &str) -> String {
    format!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow())
}

pub fn goodbye() -> String {
    "Goodbye! 👋".to_string()
}
