//! Progress check error types.

use std::time::Duration;

use crate::executor::ExecutorError;

/// Ways a progress check can fail.
#[derive(thiserror::Error, Debug)]
pub enum ProgressError {
    /// The command produced no output within the wait.
    #[error("Progress bar did not appear in {waited:?}")]
    NeverAppeared { waited: Duration },

    /// A percentage was lower than the one before it.
    #[error("Progress decreased from {from}% to {to}% (observed: {})", format_history(.history))]
    Decreased {
        from: f64,
        to: f64,
        history: Vec<f64>,
    },

    /// A percentage outside 0-100.
    #[error("Progress {value}% is outside 0-100% (observed: {})", format_history(.history))]
    OutOfRange { value: f64, history: Vec<f64> },

    /// The command exited without printing any percentage.
    #[error("Process has exited but progress doesn't complete (stderr: {})", stderr_summary(.stderr))]
    NoProgress { stderr: String },

    /// A progress bar was printed although none was expected.
    #[error("Progress bar appeared when output was redirected (observed: {})", format_history(.history))]
    UnexpectedProgress { history: Vec<f64> },

    /// The command could not be started.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Render percentages as `10%, 50.5%`.
#[must_use]
pub fn format_history(history: &[f64]) -> String {
    if history.is_empty() {
        return "none".to_string();
    }
    history
        .iter()
        .map(|v| format!("{v}%"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn stderr_summary(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        "empty"
    } else {
        trimmed
    }
}
