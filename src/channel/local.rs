//! Channels over locally spawned processes and descriptors.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::runtime::Runtime;

use super::buffer::ByteBuffer;
use super::primitive::ReadPrimitive;
use super::{Channel, ChannelError, ChannelType};
use crate::config::ChannelConfig;
use crate::process::{FdSlot, ProcessHandle};

/// Output channel for a local process or descriptor.
///
/// Local sources have no cheap way to peek for data, so [`Channel::ready`]
/// consumes one byte and stages it for the next [`Channel::read`].
#[derive(Debug)]
pub struct LocalChannel {
    channel_type: ChannelType,
    primitive: ReadPrimitive,
    buffer: ByteBuffer,
    process: Option<ProcessHandle>,
    config: ChannelConfig,
    ready: bool,
}

impl LocalChannel {
    /// Attach to the stdout or stderr pipe of `process`.
    ///
    /// Each stream can back only one channel. The executor's teardown takes
    /// the pipe back to drain it, after which the channel reads end of data.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::UnsupportedDirection` for stdin,
    /// `ChannelError::StreamUnavailable` if the stream was not piped or was
    /// already taken, and `ChannelError::InvalidChunkSize` for a zero chunk size.
    pub fn for_process(
        runtime: Arc<Runtime>,
        process: &ProcessHandle,
        channel_type: ChannelType,
        config: &ChannelConfig,
    ) -> Result<Self, ChannelError> {
        validate(channel_type, config)?;

        let slot = match channel_type {
            ChannelType::Stdout => process.claim_stdout(),
            ChannelType::Stderr => process.claim_stderr(),
            ChannelType::Stdin => None,
        };
        let slot = slot.ok_or(ChannelError::StreamUnavailable(channel_type))?;

        Ok(Self::build(
            channel_type,
            ReadPrimitive::shared_stream(slot, runtime),
            Some(process.clone()),
            config,
        ))
    }

    /// Read from an arbitrary async reader.
    ///
    /// Without an owning process the channel counts as closed once the
    /// reader reports end of data.
    ///
    /// # Errors
    ///
    /// Same construction errors as [`LocalChannel::for_process`], except that
    /// a stream is always available.
    pub fn from_reader(
        runtime: Arc<Runtime>,
        reader: impl AsyncRead + Send + Unpin + 'static,
        process: Option<ProcessHandle>,
        channel_type: ChannelType,
        config: &ChannelConfig,
    ) -> Result<Self, ChannelError> {
        validate(channel_type, config)?;
        Ok(Self::build(
            channel_type,
            ReadPrimitive::stream(Box::new(reader), runtime),
            process,
            config,
        ))
    }

    /// Read from a shared descriptor slot, such as a pseudo-terminal master.
    ///
    /// The channel never closes the descriptor; whoever owns the slot does.
    ///
    /// # Errors
    ///
    /// Same construction errors as [`LocalChannel::for_process`].
    pub fn over_fd(
        slot: FdSlot,
        process: Option<ProcessHandle>,
        channel_type: ChannelType,
        config: &ChannelConfig,
    ) -> Result<Self, ChannelError> {
        validate(channel_type, config)?;
        Ok(Self::build(
            channel_type,
            ReadPrimitive::fd(slot),
            process,
            config,
        ))
    }

    fn build(
        channel_type: ChannelType,
        primitive: ReadPrimitive,
        process: Option<ProcessHandle>,
        config: &ChannelConfig,
    ) -> Self {
        Self {
            channel_type,
            primitive,
            buffer: ByteBuffer::new(config.chunk_size),
            process,
            config: config.clone(),
            ready: false,
        }
    }

    #[must_use]
    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    /// Bytes staged by the readiness probe and not yet read.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.unread()
    }
}

fn validate(channel_type: ChannelType, config: &ChannelConfig) -> Result<(), ChannelError> {
    if channel_type == ChannelType::Stdin {
        return Err(ChannelError::UnsupportedDirection(channel_type));
    }
    if config.chunk_size == 0 {
        return Err(ChannelError::InvalidChunkSize);
    }
    Ok(())
}

impl Channel for LocalChannel {
    fn ready(&mut self) -> bool {
        if self.ready {
            return true;
        }

        tracing::debug!(channel = %self.channel_type, "Checking if local channel is ready for reading");
        let probe = self.primitive.read(1, Some(self.config.ready_timeout()));
        if probe.is_empty() && !self.primitive.at_eof() {
            tracing::debug!(channel = %self.channel_type, "Local channel not yet ready");
            return false;
        }

        // End of stream also counts as ready: later reads return nothing.
        let staged = self.buffer.stage(&probe);
        debug_assert_eq!(staged, probe.len());
        tracing::debug!(
            channel = %self.channel_type,
            bytes = probe.len(),
            "Local channel ready for reading"
        );
        self.ready = true;
        true
    }

    fn read(&mut self, size: usize) -> Vec<u8> {
        if size == 0 {
            return Vec::new();
        }
        if !self.ready() {
            tracing::debug!(channel = %self.channel_type, "Read on channel that is not ready");
            return Vec::new();
        }

        let mut out = Vec::with_capacity(size);
        let from_buffer = self.buffer.drain_into(&mut out, size);
        if out.len() == size {
            tracing::debug!(
                channel = %self.channel_type,
                requested = size,
                from_buffer,
                "Read served from staging buffer"
            );
            return out;
        }

        let mut exit_seen = false;
        while out.len() < size {
            let want = (size - out.len()).min(self.config.chunk_size);
            let chunk = self.primitive.read(want, Some(self.config.poll_timeout()));
            if chunk.is_empty() {
                if self.primitive.at_eof() {
                    break;
                }
                if self.closed() {
                    // One more attempt picks up bytes written just before exit.
                    if exit_seen {
                        break;
                    }
                    exit_seen = true;
                }
                continue;
            }
            out.extend_from_slice(&chunk);
        }

        tracing::debug!(
            channel = %self.channel_type,
            requested = size,
            returned = out.len(),
            from_buffer,
            "Read from local channel"
        );
        out
    }

    fn closed(&self) -> bool {
        match &self.process {
            Some(process) => process.has_exited(),
            None => self.primitive.at_eof(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> Arc<Runtime> {
        Arc::new(
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap(),
        )
    }

    fn channel_over(bytes: &'static [u8], chunk_size: usize) -> LocalChannel {
        let config = ChannelConfig {
            chunk_size,
            ..Default::default()
        };
        LocalChannel::from_reader(runtime(), bytes, None, ChannelType::Stdout, &config).unwrap()
    }

    #[test]
    fn test_stdin_is_rejected() {
        let err = LocalChannel::from_reader(
            runtime(),
            &b""[..],
            None,
            ChannelType::Stdin,
            &ChannelConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, ChannelError::UnsupportedDirection(ChannelType::Stdin));
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let config = ChannelConfig {
            chunk_size: 0,
            ..Default::default()
        };
        let err = LocalChannel::from_reader(runtime(), &b""[..], None, ChannelType::Stdout, &config)
            .unwrap_err();
        assert_eq!(err, ChannelError::InvalidChunkSize);
    }

    #[test]
    fn test_ready_stages_probe_byte() {
        let mut channel = channel_over(b"abcdef", 4);

        assert!(channel.ready());
        assert_eq!(channel.buffered(), 1);
        assert!(channel.ready());
        assert_eq!(channel.buffered(), 1);

        assert_eq!(channel.read(1), b"a");
        assert_eq!(channel.buffered(), 0);
        assert_eq!(channel.read(100), b"bcdef");
    }

    #[test]
    fn test_read_spans_buffer_and_chunks() {
        let mut channel = channel_over(b"0123456789", 3);
        assert!(channel.ready());

        assert_eq!(channel.read(7), b"0123456");
        assert_eq!(channel.read(7), b"789");
        assert!(channel.read(7).is_empty());
        assert!(channel.closed());
    }

    #[test]
    fn test_read_without_explicit_ready() {
        let mut channel = channel_over(b"xyz", 1024);
        assert_eq!(channel.read(2), b"xy");
        assert_eq!(channel.read(2), b"z");
    }

    #[test]
    fn test_read_zero_does_not_probe() {
        let mut channel = channel_over(b"data", 1024);
        assert!(channel.read(0).is_empty());
        assert_eq!(channel.buffered(), 0);
        assert_eq!(channel.read(4), b"data");
    }

    #[test]
    fn test_empty_source_is_ready_and_closed() {
        let mut channel = channel_over(b"", 16);
        assert!(channel.ready());
        assert!(channel.read(16).is_empty());
        assert!(channel.closed());
        assert!(channel.ready());
    }

    #[test]
    fn test_quiet_source_is_not_ready() {
        let (_writer, reader) = tokio::io::duplex(16);
        let mut channel = LocalChannel::from_reader(
            runtime(),
            reader,
            None,
            ChannelType::Stderr,
            &ChannelConfig {
                ready_timeout_ms: 10,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(!channel.ready());
        assert!(!channel.closed());
        assert_eq!(channel.channel_type(), ChannelType::Stderr);
    }

    #[test]
    fn test_concatenated_reads_match_source() {
        let source: &'static [u8] = b"the quick brown fox jumps over the lazy dog";
        for sizes in [[1, 2, 3, 50], [5, 5, 5, 5], [40, 1, 1, 1], [0, 7, 0, 100]] {
            let mut channel = channel_over(source, 4);
            assert!(channel.ready());
            let mut collected = Vec::new();
            for size in sizes {
                let chunk = channel.read(size);
                assert!(chunk.len() <= size);
                collected.extend(chunk);
            }
            let expected = sizes.iter().sum::<usize>().min(source.len());
            assert_eq!(collected, &source[..expected]);
        }
    }
}
