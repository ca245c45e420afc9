//! Command executors for local and remote test targets.
//!
//! An [`Executor`] starts commands on the target and hands back one
//! [`Channel`] per output stream, or runs a command to completion and
//! collects its [`Output`].

mod error;
mod local;
mod remote;

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

pub use error::ExecutorError;
pub use local::LocalExecutor;
pub use remote::{RemoteExecutor, Session};

use crate::channel::Channel;

/// Runs commands on a test target.
pub trait Executor {
    /// Channel type handed out for command output.
    type Channel: Channel;

    /// Start `command` and return its (stdout, stderr) channels.
    ///
    /// Returns as soon as the command is started; it keeps running while the
    /// caller reads.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be started or its output
    /// cannot be attached.
    fn exec_command(
        &mut self,
        command: impl Into<CommandLine>,
    ) -> Result<(Self::Channel, Self::Channel), ExecutorError>;

    /// Run `command` to completion and collect its output.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::Timeout` if the command outlives `timeout`.
    fn run(
        &mut self,
        command: impl Into<CommandLine>,
        timeout: Duration,
    ) -> Result<Output, ExecutorError>;

    /// Whether commands run on another host.
    fn is_remote(&self) -> bool;

    /// Reboot the target and wait until it accepts commands again.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::Unsupported` for executors that cannot reboot
    /// their target.
    fn reboot(&mut self) -> Result<(), ExecutorError>;
}

/// A command line interpreted by the target's shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine(String);

impl CommandLine {
    /// Build a command line from separate arguments, quoting each for the shell.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let quoted: Vec<String> = args
            .into_iter()
            .map(|arg| shell_escape::escape(Cow::Borrowed(arg.as_ref())).into_owned())
            .collect();
        Self(quoted.join(" "))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommandLine {
    fn from(command: &str) -> Self {
        Self(command.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(command: String) -> Self {
        Self(command)
    }
}

impl From<&String> for CommandLine {
    fn from(command: &String) -> Self {
        Self(command.clone())
    }
}

impl From<&[&str]> for CommandLine {
    fn from(args: &[&str]) -> Self {
        Self::from_args(args)
    }
}

impl<const N: usize> From<[&str; N]> for CommandLine {
    fn from(args: [&str; N]) -> Self {
        Self::from_args(args)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(args: Vec<String>) -> Self {
        Self::from_args(args)
    }
}

/// Collected result of a command run to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, or `None` if the command was killed by a signal.
    pub exit_code: Option<i32>,
}

impl Output {
    #[must_use]
    pub fn stdout_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    #[must_use]
    pub fn stderr_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl From<std::process::Output> for Output {
    fn from(output: std::process::Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code(),
        }
    }
}
