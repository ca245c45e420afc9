//! Channel error types.

use super::ChannelType;

/// Errors raised when a channel is constructed.
///
/// Reads never fail: faults on a closed stream or descriptor are reported
/// as end of data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Only output directions can be read.
    #[error("{0} is not supported - only stdout and stderr can be read")]
    UnsupportedDirection(ChannelType),

    /// The process did not expose the requested stream, or it was already taken.
    #[error("Cannot connect to process {0} - no handle provided by process")]
    StreamUnavailable(ChannelType),

    /// A chunk size of zero would never make progress.
    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,
}
