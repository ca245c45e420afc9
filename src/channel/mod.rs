//! Incremental, timeout-aware reading of command output.
//!
//! A [`Channel`] is bound to one output stream of one running command and
//! gives a single caller synchronous `ready` / `read` / `closed` operations
//! over it, whatever the underlying source:
//!
//! - [`LocalChannel`] reads a local process pipe through the executor's
//!   runtime, or a raw descriptor (pseudo-terminal master) with `poll(2)`.
//! - [`RemoteChannel`] wraps a remote session channel, which can report
//!   buffered data without consuming it and so needs no staging.
//!
//! Reads never fail. A closed stream, a closed descriptor or an I/O fault on
//! either shows up as a short or empty read, and [`Channel::closed`] tells
//! the caller whether more data can still arrive.

mod buffer;
mod error;
mod local;
mod primitive;
mod remote;

use std::fmt;

pub use buffer::ByteBuffer;
pub use error::ChannelError;
pub use local::LocalChannel;
pub use primitive::{BoxedReader, ReadPrimitive};
pub use remote::{RemoteChannel, SessionChannel};

/// Stream of a process a channel is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Stdin,
    Stdout,
    Stderr,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        };
        f.write_str(name)
    }
}

/// Read side of one output stream of a running command.
///
/// Channels are single-consumer: calls must not overlap.
pub trait Channel {
    /// True once the stream has produced data or reached its end.
    ///
    /// The answer is sticky; after the first `true` the source is not
    /// touched again.
    fn ready(&mut self) -> bool;

    /// Read up to `size` bytes.
    ///
    /// Returns fewer bytes once no more data is currently available, and an
    /// empty vector when the channel is not ready, `size` is zero, or the
    /// stream is exhausted.
    fn read(&mut self, size: usize) -> Vec<u8>;

    /// True once the command has exited. Never reverts to `false`.
    fn closed(&self) -> bool;

    /// Read `chunk`-sized pieces until a read comes back empty.
    fn read_to_end(&mut self, chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let next = self.read(chunk);
            if next.is_empty() {
                return out;
            }
            out.extend_from_slice(&next);
        }
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn ready(&mut self) -> bool {
        (**self).ready()
    }

    fn read(&mut self, size: usize) -> Vec<u8> {
        (**self).read(size)
    }

    fn closed(&self) -> bool {
        (**self).closed()
    }
}
