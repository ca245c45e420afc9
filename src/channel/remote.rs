//! Channels over a remote interactive session.

use std::io;

use super::{Channel, ChannelError, ChannelType};
use crate::config::ChannelConfig;

/// Output stream of a command running in a remote session.
///
/// Implemented by the remote transport. Every method must return without
/// waiting for the remote side.
pub trait SessionChannel {
    /// True if `recv` would return data right now.
    fn recv_ready(&self) -> bool;

    /// Up to `size` already-received bytes; empty when none are buffered.
    ///
    /// # Errors
    ///
    /// Returns the transport's I/O error. Channels treat it as end of data.
    fn recv(&mut self, size: usize) -> io::Result<Vec<u8>>;

    /// Exit status of the remote command, once the remote side has sent it.
    fn exit_status(&self) -> Option<i32>;

    fn exit_status_ready(&self) -> bool {
        self.exit_status().is_some()
    }
}

/// Channel over a [`SessionChannel`].
///
/// The session can report buffered data without consuming it, so readiness
/// needs no probe. Bytes a session hands back beyond the requested amount
/// are kept for the next read.
#[derive(Debug)]
pub struct RemoteChannel<S> {
    session: S,
    channel_type: ChannelType,
    chunk_size: usize,
    overflow: Vec<u8>,
    ready: bool,
}

impl<S: SessionChannel> RemoteChannel<S> {
    /// # Errors
    ///
    /// Returns `ChannelError::UnsupportedDirection` for stdin and
    /// `ChannelError::InvalidChunkSize` for a zero chunk size.
    pub fn new(
        session: S,
        channel_type: ChannelType,
        config: &ChannelConfig,
    ) -> Result<Self, ChannelError> {
        if channel_type == ChannelType::Stdin {
            return Err(ChannelError::UnsupportedDirection(channel_type));
        }
        if config.chunk_size == 0 {
            return Err(ChannelError::InvalidChunkSize);
        }
        Ok(Self {
            session,
            channel_type,
            chunk_size: config.chunk_size,
            overflow: Vec::new(),
            ready: false,
        })
    }

    #[must_use]
    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    /// Exit status of the remote command, if it has been reported.
    #[must_use]
    pub fn exit_status(&self) -> Option<i32> {
        self.session.exit_status()
    }

    #[must_use]
    pub fn session(&self) -> &S {
        &self.session
    }
}

impl<S: SessionChannel> Channel for RemoteChannel<S> {
    fn ready(&mut self) -> bool {
        if !self.ready {
            // A command that exits silently is as ready as it will ever be.
            self.ready = self.session.recv_ready() || self.session.exit_status_ready();
        }
        self.ready
    }

    fn read(&mut self, size: usize) -> Vec<u8> {
        if size == 0 || !self.ready() {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(size);
        let carried = size.min(self.overflow.len());
        out.extend(self.overflow.drain(..carried));

        while out.len() < size {
            let want = (size - out.len()).min(self.chunk_size);
            match self.session.recv(want) {
                Ok(chunk) if chunk.is_empty() => break,
                Ok(mut chunk) => {
                    if chunk.len() > want {
                        tracing::debug!(
                            channel = %self.channel_type,
                            requested = want,
                            received = chunk.len(),
                            "Session returned more than requested, keeping the rest"
                        );
                        self.overflow.extend_from_slice(&chunk[want..]);
                        chunk.truncate(want);
                    }
                    out.extend_from_slice(&chunk);
                }
                Err(e) => {
                    tracing::debug!(
                        channel = %self.channel_type,
                        error = %e,
                        "Session read failed, treating as end of data"
                    );
                    break;
                }
            }
        }

        tracing::debug!(
            channel = %self.channel_type,
            requested = size,
            returned = out.len(),
            "Read from remote channel"
        );
        out
    }

    fn closed(&self) -> bool {
        self.session.exit_status_ready()
    }
}
