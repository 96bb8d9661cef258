//! I/O error types.

use std::path::PathBuf;

/// Errors from a resource provider.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Underlying OS I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Resource not found.
    #[error("resource not found: {path}")]
    NotFound { path: PathBuf },

    /// Handle is unknown to the backend or was already closed.
    #[error("invalid resource handle: {handle}")]
    InvalidHandle { handle: u64 },

    /// Handle was not opened for reading.
    #[error("handle {handle} is not open for reading")]
    NotReadable { handle: u64 },

    /// Handle was not opened for writing.
    #[error("handle {handle} is not open for writing")]
    NotWritable { handle: u64 },

    /// Requested byte range lies outside the resource.
    #[error("range {offset}+{len} exceeds resource size {size}")]
    OutOfRange { offset: u64, len: u64, size: u64 },

    /// Backend cannot perform the operation.
    #[error("operation not supported by this backend: {operation}")]
    Unsupported { operation: &'static str },
}
