//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of bytes pulled from a source in one read.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Tuning for output channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Maximum bytes requested from the source per read, and staging buffer capacity.
    pub chunk_size: usize,
    /// Bound on the one-byte readiness probe.
    pub ready_timeout_ms: u64,
    /// Bound on each read attempt while waiting for a live process to write.
    pub poll_timeout_ms: u64,
}

impl ChannelConfig {
    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            ready_timeout_ms: 200,
            poll_timeout_ms: 100,
        }
    }
}

/// Configuration for command executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Shell used to interpret command lines.
    pub shell: String,
    /// Time a process gets between SIGTERM and SIGKILL during teardown.
    pub terminate_grace_ms: u64,
    /// Command issued on the remote target to reboot it.
    pub reboot_command: String,
    /// Time allowed for a rebooted target to accept a new session.
    pub reboot_timeout_secs: u64,
    /// Sleep between polls while collecting remote command output.
    pub remote_poll_interval_ms: u64,
}

impl ExecutorConfig {
    #[must_use]
    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }

    #[must_use]
    pub fn reboot_timeout(&self) -> Duration {
        Duration::from_secs(self.reboot_timeout_secs)
    }

    #[must_use]
    pub fn remote_poll_interval(&self) -> Duration {
        Duration::from_millis(self.remote_poll_interval_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            terminate_grace_ms: 2000,
            reboot_command: "reboot".to_string(),
            reboot_timeout_secs: 300,
            remote_poll_interval_ms: 50,
        }
    }
}

/// Configuration for progress bar checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// How long to wait for the command to start producing output.
    pub appear_timeout_secs: u64,
    /// Interval between readiness polls.
    pub poll_interval_ms: u64,
    /// Bytes requested from stdout per read.
    pub read_size: usize,
}

impl ProgressConfig {
    #[must_use]
    pub fn appear_timeout(&self) -> Duration {
        Duration::from_secs(self.appear_timeout_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            appear_timeout_secs: 120,
            poll_interval_ms: 1000,
            read_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Top-level framework configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    pub channel: ChannelConfig,
    pub executor: ExecutorConfig,
    pub progress: ProgressConfig,
}
