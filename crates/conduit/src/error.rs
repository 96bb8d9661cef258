//! Top-level error type.

use conduit_buffer::BufferError;
use conduit_channel::ChannelError;
use conduit_config::ConfigError;
use conduit_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConduitError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Failure surfaced through a `std::io` stream decorator.
    #[error("stream error: {0}")]
    Stream(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConduitError>;
