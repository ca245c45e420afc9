//! Progress bar checks for long-running cache management commands.
//!
//! Commands such as cache flushes print a percentage that must appear
//! within a bounded wait, never decrease and stay within 0-100%. The check
//! only relies on the [`Channel`](crate::channel::Channel) contract, so it
//! works the same against local and remote targets.

mod error;
mod monitor;
mod parser;
mod tracker;

pub use error::{format_history, ProgressError};
pub use monitor::{ProgressExpectation, ProgressMonitor, ProgressReport};
pub use parser::{parse_percentages, PercentScanner};
pub use tracker::ProgressTracker;
