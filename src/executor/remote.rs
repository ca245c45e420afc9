//! Executor for commands on a remote target.

use std::io;
use std::time::{Duration, Instant};

use super::{CommandLine, Executor, ExecutorError, Output};
use crate::channel::{Channel, ChannelType, RemoteChannel, SessionChannel};
use crate::config::{ChannelConfig, ExecutorConfig};

/// Interactive session to a remote test target.
///
/// Implemented by the remote transport; connection setup and
/// authentication are its business.
pub trait Session {
    type Channel: SessionChannel;

    /// Start `command` and return its (stdout, stderr) streams.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the command cannot be started.
    fn exec(&mut self, command: &str) -> io::Result<(Self::Channel, Self::Channel)>;

    /// Re-establish the session, retrying for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the last connection error once `timeout` has passed.
    fn reconnect(&mut self, timeout: Duration) -> io::Result<()>;
}

/// Runs commands through a [`Session`].
#[derive(Debug)]
pub struct RemoteExecutor<S> {
    session: S,
    config: ExecutorConfig,
    channel_config: ChannelConfig,
}

impl<S: Session> RemoteExecutor<S> {
    #[must_use]
    pub fn new(session: S, config: ExecutorConfig, channel_config: ChannelConfig) -> Self {
        Self {
            session,
            config,
            channel_config,
        }
    }

    #[must_use]
    pub fn session(&self) -> &S {
        &self.session
    }

    fn start(
        &mut self,
        command: &str,
    ) -> Result<(RemoteChannel<S::Channel>, RemoteChannel<S::Channel>), ExecutorError> {
        let (stdout, stderr) = self.session.exec(command).map_err(ExecutorError::Session)?;
        tracing::debug!(command, "Started remote command");
        Ok((
            RemoteChannel::new(stdout, ChannelType::Stdout, &self.channel_config)?,
            RemoteChannel::new(stderr, ChannelType::Stderr, &self.channel_config)?,
        ))
    }
}

impl<S: Session> Executor for RemoteExecutor<S> {
    type Channel = RemoteChannel<S::Channel>;

    fn exec_command(
        &mut self,
        command: impl Into<CommandLine>,
    ) -> Result<(Self::Channel, Self::Channel), ExecutorError> {
        let command = command.into();
        self.start(command.as_str())
    }

    fn run(
        &mut self,
        command: impl Into<CommandLine>,
        timeout: Duration,
    ) -> Result<Output, ExecutorError> {
        let command = command.into();
        let (mut stdout, mut stderr) = self.start(command.as_str())?;
        let deadline = Instant::now() + timeout;
        let chunk = self.channel_config.chunk_size;
        let mut output = Output::default();

        loop {
            let out = stdout.read(chunk);
            let err = stderr.read(chunk);
            let idle = out.is_empty() && err.is_empty();
            output.stdout.extend_from_slice(&out);
            output.stderr.extend_from_slice(&err);

            if idle {
                if stdout.closed() {
                    // Pick up anything that arrived with the exit status.
                    output.stdout.extend(stdout.read_to_end(chunk));
                    output.stderr.extend(stderr.read_to_end(chunk));
                    break;
                }
                if Instant::now() >= deadline {
                    return Err(ExecutorError::Timeout {
                        command: command.to_string(),
                        timeout,
                    });
                }
                std::thread::sleep(self.config.remote_poll_interval());
            }
        }

        output.exit_code = stdout.exit_status();
        tracing::debug!(
            command = %command,
            exit_code = ?output.exit_code,
            "Remote command finished"
        );
        Ok(output)
    }

    fn is_remote(&self) -> bool {
        true
    }

    fn reboot(&mut self) -> Result<(), ExecutorError> {
        let command = self.config.reboot_command.clone();
        tracing::info!(command = %command, "Rebooting remote target");
        // The session drops with the target, so the command's output is not awaited.
        drop(self.start(&command)?);
        self.session
            .reconnect(self.config.reboot_timeout())
            .map_err(ExecutorError::Session)?;
        tracing::info!("Remote target is back after reboot");
        Ok(())
    }
}
