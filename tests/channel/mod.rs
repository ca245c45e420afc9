//! Channel tests against real processes.

mod local_test;
mod pty_test;

/// Verify the channel types are exported from the library.
#[test]
fn test_all_channel_types_exported() {
    use cas_functest::channel::{
        ByteBuffer, Channel, ChannelError, ChannelType, LocalChannel, RemoteChannel,
        SessionChannel,
    };

    let _ = ByteBuffer::new(16);
    let _: fn() -> ChannelError = || ChannelError::InvalidChunkSize;
    let _ = ChannelType::Stdout;

    fn assert_channel<C: Channel>() {}
    fn assert_remote<S: SessionChannel>() {
        assert_channel::<RemoteChannel<S>>();
    }
    assert_channel::<LocalChannel>();
    let _ = assert_remote::<NoSession>;
}

struct NoSession;

impl cas_functest::channel::SessionChannel for NoSession {
    fn recv_ready(&self) -> bool {
        false
    }

    fn recv(&mut self, _size: usize) -> std::io::Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn exit_status(&self) -> Option<i32> {
        None
    }
}
