//! Single bounded reads over a local output source.
//!
//! A [`ReadPrimitive`] produces up to `size` bytes from its source. A
//! timeout of `None` blocks until data arrives or the source ends; with
//! `Some(timeout)` an empty result means nothing arrived in time. End of
//! data and read faults also yield an empty result and set the sticky
//! [`ReadPrimitive::at_eof`] flag, so callers can tell a quiet source from a
//! finished one.

use std::fmt;
use std::io::{ErrorKind, Read};
use std::os::fd::{AsFd, BorrowedFd};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::runtime::Runtime;

use crate::process::{FdSlot, StreamSlot};

/// Boxed asynchronous reader driven by a channel's runtime.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Source-specific read strategy for local channels.
pub enum ReadPrimitive {
    /// An async stream reader, driven to completion on the executor runtime.
    Stream {
        slot: StreamSlot,
        runtime: Arc<Runtime>,
        eof: bool,
    },
    /// A raw descriptor, read with blocking I/O after a `poll(2)` readiness check.
    Fd { slot: FdSlot, eof: bool },
}

impl fmt::Debug for ReadPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream { eof, .. } => f.debug_struct("Stream").field("eof", eof).finish(),
            Self::Fd { eof, .. } => f.debug_struct("Fd").field("eof", eof).finish(),
        }
    }
}

impl ReadPrimitive {
    #[must_use]
    pub fn stream(reader: BoxedReader, runtime: Arc<Runtime>) -> Self {
        Self::shared_stream(Arc::new(Mutex::new(Some(reader))), runtime)
    }

    /// Read from a reader whose owner may take it away; an empty slot reads
    /// as end of data.
    #[must_use]
    pub fn shared_stream(slot: StreamSlot, runtime: Arc<Runtime>) -> Self {
        Self::Stream {
            slot,
            runtime,
            eof: false,
        }
    }

    #[must_use]
    pub fn fd(slot: FdSlot) -> Self {
        Self::Fd { slot, eof: false }
    }

    /// True once the source has reported end of data.
    #[must_use]
    pub fn at_eof(&self) -> bool {
        match self {
            Self::Stream { eof, .. } | Self::Fd { eof, .. } => *eof,
        }
    }

    /// Read up to `size` bytes, waiting at most `timeout` (forever if `None`).
    pub fn read(&mut self, size: usize, timeout: Option<Duration>) -> Vec<u8> {
        if size == 0 || self.at_eof() {
            return Vec::new();
        }
        match self {
            Self::Stream { slot, runtime, eof } => read_stream(slot, runtime, eof, size, timeout),
            Self::Fd { slot, eof } => read_fd(slot, eof, size, timeout),
        }
    }
}

fn read_stream(
    slot: &StreamSlot,
    runtime: &Runtime,
    eof: &mut bool,
    size: usize,
    timeout: Option<Duration>,
) -> Vec<u8> {
    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(reader) = guard.as_mut() else {
        tracing::debug!("Stream already taken by teardown, treating as end of data");
        *eof = true;
        return Vec::new();
    };

    let mut buf = vec![0; size];
    let result = runtime.block_on(async {
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, reader.read(&mut buf))
                .await
                .ok(),
            None => Some(reader.read(&mut buf).await),
        }
    });

    match result {
        None => Vec::new(),
        Some(Ok(0)) => {
            *eof = true;
            Vec::new()
        }
        Some(Ok(n)) => {
            buf.truncate(n);
            buf
        }
        Some(Err(e)) if e.kind() == ErrorKind::Interrupted => Vec::new(),
        Some(Err(e)) => {
            tracing::debug!(error = %e, "Stream read failed, treating as end of data");
            *eof = true;
            Vec::new()
        }
    }
}

fn read_fd(slot: &FdSlot, eof: &mut bool, size: usize, timeout: Option<Duration>) -> Vec<u8> {
    let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(file) = guard.as_ref() else {
        tracing::debug!("Descriptor already closed, treating as end of data");
        *eof = true;
        return Vec::new();
    };

    if let Some(timeout) = timeout {
        match wait_readable(file.as_fd(), timeout) {
            Ok(true) => {}
            Ok(false) => return Vec::new(),
            Err(e) => {
                tracing::debug!(error = %e, "Descriptor poll failed, treating as end of data");
                *eof = true;
                return Vec::new();
            }
        }
    }

    let mut buf = vec![0; size];
    let mut reader = file;
    match reader.read(&mut buf) {
        Ok(0) => {
            *eof = true;
            Vec::new()
        }
        Ok(n) => {
            buf.truncate(n);
            buf
        }
        Err(e) if e.kind() == ErrorKind::Interrupted => Vec::new(),
        Err(e) => {
            // A pty master reports EIO once the slave side has closed.
            tracing::debug!(error = %e, "Descriptor read failed, treating as end of data");
            *eof = true;
            Vec::new()
        }
    }
}

/// Wait up to `timeout` for `fd` to have data or a hangup pending.
fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration) -> Result<bool, Errno> {
    let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    match poll(&mut fds, PollTimeout::from(millis)) {
        Ok(0) | Err(Errno::EINTR) => Ok(false),
        Ok(_) => {
            let revents = fds[0].revents().unwrap_or_else(PollFlags::empty);
            if revents.contains(PollFlags::POLLNVAL) {
                return Err(Errno::EBADF);
            }
            Ok(revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR))
        }
        Err(e) => Err(e),
    }
}
