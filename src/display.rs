//! Colored CLI display utilities for test output.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::executor::Output;
use crate::progress::{format_history, ProgressReport};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to at most `max_len` bytes, adding an ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.len() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let mut end = max_len - 3;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Print the start of a progress check.
pub fn print_check_start(command: &str, raw_mode: bool) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[CHECK]".blue().bold(),
        truncate(command, 120, raw_mode).cyan()
    );
    let _ = io::stdout().flush();
}

/// Print a passed progress check.
pub fn print_check_passed(report: &ProgressReport) {
    println!(
        "{} {} progress: {}",
        timestamp().dimmed(),
        "[PASS]".green().bold(),
        format_history(&report.history).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print a failed check with its reason.
pub fn print_check_failed(reason: &str, raw_mode: bool) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[FAIL]".red().bold(),
        truncate(reason, 400, raw_mode).red()
    );
    let _ = io::stdout().flush();
}

/// Print the collected output of a finished command.
pub fn print_output(output: &Output) {
    print!("{}", output.stdout_str());
    let stderr = output.stderr_str();
    if !stderr.is_empty() {
        print!("{}", stderr.yellow());
    }
    let code = output
        .exit_code
        .map_or_else(|| "signal".to_string(), |c| c.to_string());
    if output.success() {
        println!("{} exit={}", "[EXIT]".green().bold(), code);
    } else {
        println!("{} exit={}", "[EXIT]".red().bold(), code);
    }
    let _ = io::stdout().flush();
}

/// Print raw bytes read from a channel.
pub fn print_chunk(chunk: &[u8]) {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(chunk);
    let _ = stdout.flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stdout().flush();
}
