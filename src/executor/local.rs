//! Executor for commands on the local host.

use std::fs::File;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use nix::pty::{openpty, Winsize};
use nix::sys::termios::Termios;
use tokio::process::Command;
use tokio::runtime::Runtime;

use super::{CommandLine, Executor, ExecutorError, Output};
use crate::channel::{ChannelType, LocalChannel};
use crate::config::{ChannelConfig, ExecutorConfig};
use crate::process::{fd_slot, ProcessHandle, ProcessRegistry};

/// Runs commands through the local shell.
///
/// The executor owns a single-threaded runtime that its channels use to
/// drive pipe reads, plus every process and pseudo-terminal it created.
/// [`LocalExecutor::shutdown`] (also run on drop) terminates the processes,
/// closes the descriptors and only then lets go of the runtime.
///
/// Channels hold a reference to the runtime and must be dropped outside
/// any async context.
#[derive(Debug)]
pub struct LocalExecutor {
    runtime: Option<Arc<Runtime>>,
    registry: ProcessRegistry,
    config: ExecutorConfig,
    channel_config: ChannelConfig,
}

impl LocalExecutor {
    /// Create an executor with default settings.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::Runtime` if the runtime cannot be built.
    pub fn new() -> Result<Self, ExecutorError> {
        Self::with_config(ExecutorConfig::default(), ChannelConfig::default())
    }

    /// Create an executor with explicit executor and channel settings.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::Runtime` if the runtime cannot be built.
    pub fn with_config(
        config: ExecutorConfig,
        channel_config: ChannelConfig,
    ) -> Result<Self, ExecutorError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ExecutorError::Runtime)?;

        Ok(Self {
            runtime: Some(Arc::new(runtime)),
            registry: ProcessRegistry::new(),
            config,
            channel_config,
        })
    }

    /// Number of processes awaiting teardown.
    #[must_use]
    pub fn tracked_processes(&self) -> usize {
        self.registry.process_count()
    }

    /// Number of descriptors awaiting teardown.
    #[must_use]
    pub fn tracked_descriptors(&self) -> usize {
        self.registry.descriptor_count()
    }

    fn runtime(&self) -> Result<&Arc<Runtime>, ExecutorError> {
        self.runtime.as_ref().ok_or(ExecutorError::ShutDown)
    }

    fn spawn(&mut self, command: &str, stdout: Stdio) -> Result<ProcessHandle, ExecutorError> {
        let runtime = Arc::clone(self.runtime()?);
        let _guard = runtime.enter();

        // Dropping the Command right after spawn closes the parent's copy of
        // any pty slave handed in as stdout.
        let child = Command::new(&self.config.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let process = ProcessHandle::new(command, child);
        tracing::debug!(command, pid = ?process.id(), "Spawned command");
        self.registry.track_process(process.clone());
        Ok(process)
    }

    /// Run `command` with stdout attached to a pseudo-terminal.
    ///
    /// Programs usually only draw progress bars when writing to a terminal.
    /// Stdout is read from the pty master; stderr stays a pipe. The terminal
    /// translates `\n` into `\r\n`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::Pty` if no pseudo-terminal is available, or
    /// the same errors as [`Executor::exec_command`].
    pub fn exec_command_pty(
        &mut self,
        command: impl Into<CommandLine>,
    ) -> Result<(LocalChannel, LocalChannel), ExecutorError> {
        let command = command.into();
        let pty = openpty(None::<&Winsize>, None::<&Termios>)?;

        let process = self.spawn(command.as_str(), Stdio::from(pty.slave))?;
        let slot = fd_slot(File::from(pty.master));
        self.registry.track_descriptor(slot.clone());

        let runtime = Arc::clone(self.runtime()?);
        let stdout = LocalChannel::over_fd(
            slot,
            Some(process.clone()),
            ChannelType::Stdout,
            &self.channel_config,
        )?;
        let stderr = LocalChannel::for_process(
            runtime,
            &process,
            ChannelType::Stderr,
            &self.channel_config,
        )?;
        Ok((stdout, stderr))
    }

    /// Terminate all tracked processes, close tracked descriptors and
    /// release the runtime. Later calls do nothing.
    pub fn shutdown(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };

        self.registry.teardown(&runtime, self.config.terminate_grace());

        match Arc::try_unwrap(runtime) {
            Ok(runtime) => runtime.shutdown_timeout(Duration::from_millis(100)),
            Err(_) => {
                tracing::debug!("Runtime still referenced by open channels, released when they drop");
            }
        }
    }
}

impl Executor for LocalExecutor {
    type Channel = LocalChannel;

    fn exec_command(
        &mut self,
        command: impl Into<CommandLine>,
    ) -> Result<(LocalChannel, LocalChannel), ExecutorError> {
        let command = command.into();
        let process = self.spawn(command.as_str(), Stdio::piped())?;

        let runtime = Arc::clone(self.runtime()?);
        let stdout = LocalChannel::for_process(
            Arc::clone(&runtime),
            &process,
            ChannelType::Stdout,
            &self.channel_config,
        )?;
        let stderr = LocalChannel::for_process(
            runtime,
            &process,
            ChannelType::Stderr,
            &self.channel_config,
        )?;
        Ok((stdout, stderr))
    }

    fn run(
        &mut self,
        command: impl Into<CommandLine>,
        timeout: Duration,
    ) -> Result<Output, ExecutorError> {
        let command = command.into();
        let runtime = self.runtime()?;

        let result = runtime.block_on(async {
            let mut cmd = Command::new(&self.config.shell);
            cmd.arg("-c")
                .arg(command.as_str())
                .stdin(Stdio::null())
                .kill_on_drop(true);
            tokio::time::timeout(timeout, cmd.output()).await
        });

        match result {
            Err(_) => Err(ExecutorError::Timeout {
                command: command.to_string(),
                timeout,
            }),
            Ok(Err(source)) => Err(ExecutorError::Spawn {
                command: command.to_string(),
                source,
            }),
            Ok(Ok(output)) => {
                let output = Output::from(output);
                tracing::debug!(
                    command = %command,
                    exit_code = ?output.exit_code,
                    stdout_len = output.stdout.len(),
                    stderr_len = output.stderr.len(),
                    "Command finished"
                );
                Ok(output)
            }
        }
    }

    fn is_remote(&self) -> bool {
        false
    }

    fn reboot(&mut self) -> Result<(), ExecutorError> {
        Err(ExecutorError::Unsupported(
            "local executor cannot reboot the host it runs on",
        ))
    }
}

impl Drop for LocalExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
