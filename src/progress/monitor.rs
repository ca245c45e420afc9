//! Progress bar checks over command output channels.

use serde::Serialize;

use super::{PercentScanner, ProgressError, ProgressTracker};
use crate::channel::Channel;
use crate::config::ProgressConfig;
use crate::executor::{CommandLine, Executor};
use crate::wait::wait_until;

/// Whether a command is expected to print a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressExpectation {
    /// Progress must appear, rise monotonically and stay within 0-100%.
    Expected,
    /// No progress may be printed, e.g. because output goes to a file.
    Absent,
}

/// Outcome of a successful progress check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub command: String,
    /// Every percentage observed, in order.
    pub history: Vec<f64>,
    /// Final percentage, if any was printed.
    pub last: Option<f64>,
}

impl ProgressReport {
    #[must_use]
    pub fn new(command: impl Into<String>, history: Vec<f64>) -> Self {
        let last = history.last().copied();
        Self {
            command: command.into(),
            history,
            last,
        }
    }
}

/// Watches a command's stdout for a progress bar.
#[derive(Debug, Clone, Default)]
pub struct ProgressMonitor {
    config: ProgressConfig,
}

impl ProgressMonitor {
    #[must_use]
    pub fn new(config: ProgressConfig) -> Self {
        Self { config }
    }

    /// Start `command` on `executor` and check its progress output.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Executor` if the command cannot be started, or
    /// any error from [`ProgressMonitor::watch`].
    pub fn check<E: Executor>(
        &self,
        executor: &mut E,
        command: impl Into<CommandLine>,
        expectation: ProgressExpectation,
    ) -> Result<ProgressReport, ProgressError> {
        let command = command.into();
        tracing::info!(command = %command, "Check progress for command");
        let (mut stdout, mut stderr) = executor.exec_command(command.clone())?;
        self.watch(command.as_str(), &mut stdout, &mut stderr, expectation)
    }

    /// Check the progress printed on `stdout` of an already running command.
    ///
    /// # Errors
    ///
    /// - `NeverAppeared` if progress is expected but stdout stays silent.
    /// - `Decreased` / `OutOfRange` for an invalid percentage sequence.
    /// - `NoProgress` if the command exits without printing a percentage;
    ///   carries whatever the command wrote to stderr.
    /// - `UnexpectedProgress` if progress is printed although it should not be.
    pub fn watch<C: Channel>(
        &self,
        command: &str,
        stdout: &mut C,
        stderr: &mut C,
        expectation: ProgressExpectation,
    ) -> Result<ProgressReport, ProgressError> {
        let appeared = wait_until(
            || stdout.ready(),
            self.config.appear_timeout(),
            self.config.poll_interval(),
        );

        match (appeared, expectation) {
            (false, ProgressExpectation::Expected) => Err(ProgressError::NeverAppeared {
                waited: self.config.appear_timeout(),
            }),
            (false, ProgressExpectation::Absent) => {
                tracing::info!(command, "Progress bar did not appear when output was redirected");
                Ok(ProgressReport::new(command, Vec::new()))
            }
            (true, ProgressExpectation::Absent) => self.ensure_absent(command, stdout),
            (true, ProgressExpectation::Expected) => self.follow(command, stdout, stderr),
        }
    }

    fn follow<C: Channel>(
        &self,
        command: &str,
        stdout: &mut C,
        stderr: &mut C,
    ) -> Result<ProgressReport, ProgressError> {
        let mut scanner = PercentScanner::new();
        let mut tracker = ProgressTracker::new();

        loop {
            let chunk = stdout.read(self.config.read_size);
            let values = scanner.feed(&String::from_utf8_lossy(&chunk));
            if !values.is_empty() {
                for value in values {
                    tracker.observe(value)?;
                }
                tracing::info!(command, percentage = ?tracker.last(), "Progress");
                continue;
            }

            let closed = stdout.closed();
            if tracker.last().is_some() && (chunk.is_empty() || closed) {
                tracing::info!(command, "Progress complete");
                return Ok(ProgressReport::new(command, tracker.into_history()));
            }

            if chunk.is_empty() {
                if closed {
                    tracing::warn!(command, "Process finished without reporting any progress output");
                    let stderr = self.drain_stderr(stderr);
                    return Err(ProgressError::NoProgress { stderr });
                }
                std::thread::sleep(self.config.poll_interval());
            }
        }
    }

    fn ensure_absent<C: Channel>(
        &self,
        command: &str,
        stdout: &mut C,
    ) -> Result<ProgressReport, ProgressError> {
        let mut scanner = PercentScanner::new();
        let mut history = Vec::new();

        loop {
            let chunk = stdout.read(self.config.read_size);
            history.extend(scanner.feed(&String::from_utf8_lossy(&chunk)));
            if !chunk.is_empty() {
                continue;
            }
            if stdout.closed() {
                break;
            }
            std::thread::sleep(self.config.poll_interval());
        }

        if history.is_empty() {
            tracing::info!(command, "No progress printed, as expected");
            Ok(ProgressReport::new(command, history))
        } else {
            Err(ProgressError::UnexpectedProgress { history })
        }
    }

    fn drain_stderr<C: Channel>(&self, stderr: &mut C) -> String {
        let content = stderr.read_to_end(self.config.read_size);
        let content = String::from_utf8_lossy(&content).into_owned();
        if content.is_empty() {
            tracing::debug!("No content found on error channel");
        } else {
            tracing::debug!("Process stderr content follows:");
            for line in content.lines() {
                tracing::debug!("    {line}");
            }
        }
        content
    }
}
