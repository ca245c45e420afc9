//! Executor error types.

use std::time::Duration;

use crate::channel::ChannelError;

/// Errors raised by command executors.
#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
    /// The runtime driving local process I/O could not be created.
    #[error("Failed to start executor runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The command could not be started.
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// No pseudo-terminal could be allocated.
    #[error("Failed to allocate pseudo-terminal: {0}")]
    Pty(#[from] nix::errno::Errno),

    /// Output channels could not be attached.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// The command did not finish in time.
    #[error("Command timed out after {timeout:?}: {command}")]
    Timeout { command: String, timeout: Duration },

    /// The executor cannot perform this operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The remote session failed.
    #[error("Remote session error: {0}")]
    Session(#[source] std::io::Error),

    /// The executor was already shut down.
    #[error("Executor has been shut down")]
    ShutDown,
}
