//! Shared output helpers for text and JSON modes.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print a serializable result as pretty JSON.
///
/// Text mode is handled by each command, so this is a no-op there.
pub fn print<T: Serialize>(value: &T, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    if let OutputFormat::Json = format {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("{}: failed to serialize result: {}", "Error".red().bold(), e),
        }
    }
}

/// Print a one-line success message in text mode.
pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    if let OutputFormat::Text = format {
        println!("{} {}", "✓".green().bold(), message);
    }
}

/// Print a one-line warning in text mode.
pub fn warning(message: &str, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    if let OutputFormat::Text = format {
        println!("{} {}", "!".yellow().bold(), message);
    }
}
