//! Buffer error types.

/// Errors from buffer operations.
///
/// Everything except `InvalidArgument` on allocation points at a caller
/// bug: the requested operation would break the cursor ordering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// A write needs more room than `limit - position`.
    #[error("buffer overflow: {requested} bytes requested, {remaining} remaining")]
    Overflow { requested: usize, remaining: usize },

    /// A read needs more bytes than `limit - position`.
    #[error("buffer underflow: {requested} bytes requested, {remaining} remaining")]
    Underflow { requested: usize, remaining: usize },

    /// The operation is not valid in the current cursor state.
    #[error("invalid buffer state: {0}")]
    InvalidState(&'static str),

    /// A cursor value or capacity was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The storage does not accept writes.
    #[error("buffer is read-only")]
    ReadOnly,
}
