//! Channel error types.

use std::io;

use conduit_buffer::BufferError;
use conduit_io::IoError;

/// Errors from channel operations and transfer loops.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel was closed before or during the operation.
    #[error("channel is closed")]
    Closed,

    /// An offset, length or buffer set was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying resource failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// A buffer operation would break the cursor ordering.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

impl From<ChannelError> for io::Error {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Io(IoError::Io { source }) => source,
            ChannelError::Closed => io::Error::new(io::ErrorKind::NotConnected, err),
            ChannelError::InvalidArgument(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            other => io::Error::other(other),
        }
    }
}

impl From<io::Error> for ChannelError {
    fn from(err: io::Error) -> Self {
        ChannelError::Io(err.into())
    }
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
