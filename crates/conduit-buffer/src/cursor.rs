//! The four-cursor value type.
//!
//! ```text
//! 0 <= mark <= position <= limit <= capacity
//! ```
//!
//! [`Cursors`] is the only place these four numbers are mutated. Every
//! method either keeps the ordering or returns an error and leaves the value
//! untouched, so a `Cursors` that violates the ordering cannot be observed.

use crate::BufferError;

/// Capacity, limit, position and optional mark of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursors {
    capacity: usize,
    limit: usize,
    position: usize,
    mark: Option<usize>,
}

impl Cursors {
    /// Cursors for a fresh buffer in write mode.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            limit: capacity,
            position: 0,
            mark: None,
        }
    }

    /// Builds cursors from explicit values, rejecting any ordering violation.
    pub fn try_new(
        capacity: usize,
        limit: usize,
        position: usize,
        mark: Option<usize>,
    ) -> Result<Self, BufferError> {
        if limit > capacity {
            return Err(BufferError::InvalidArgument(format!(
                "limit {limit} exceeds capacity {capacity}"
            )));
        }
        if position > limit {
            return Err(BufferError::InvalidArgument(format!(
                "position {position} exceeds limit {limit}"
            )));
        }
        if let Some(mark) = mark.filter(|&mark| mark > position) {
            return Err(BufferError::InvalidArgument(format!(
                "mark {mark} exceeds position {position}"
            )));
        }
        Ok(Self {
            capacity,
            limit,
            position,
            mark,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn mark(&self) -> Option<usize> {
        self.mark
    }

    /// `limit - position`.
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    /// Moves the position. A mark beyond the new position is discarded.
    pub fn set_position(&mut self, position: usize) -> Result<(), BufferError> {
        if position > self.limit {
            return Err(BufferError::InvalidArgument(format!(
                "position {position} exceeds limit {}",
                self.limit
            )));
        }
        self.position = position;
        if self.mark.is_some_and(|mark| mark > position) {
            self.mark = None;
        }
        Ok(())
    }

    /// Moves the limit. The position is pulled back to the new limit if it
    /// lies beyond it, and a mark beyond the new limit is discarded.
    pub fn set_limit(&mut self, limit: usize) -> Result<(), BufferError> {
        if limit > self.capacity {
            return Err(BufferError::InvalidArgument(format!(
                "limit {limit} exceeds capacity {}",
                self.capacity
            )));
        }
        self.limit = limit;
        if self.position > limit {
            self.position = limit;
        }
        if self.mark.is_some_and(|mark| mark > limit) {
            self.mark = None;
        }
        Ok(())
    }

    /// Advances the position by `n`.
    pub fn advance(&mut self, n: usize) -> Result<(), BufferError> {
        if n > self.remaining() {
            return Err(BufferError::InvalidArgument(format!(
                "cannot advance {n} bytes with {} remaining",
                self.remaining()
            )));
        }
        self.position += n;
        Ok(())
    }

    /// Write mode → read mode over what was written.
    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
        self.mark = None;
    }

    pub fn rewind(&mut self) {
        self.position = 0;
        self.mark = None;
    }

    /// Back to the initial write-mode state.
    pub fn clear(&mut self) {
        self.limit = self.capacity;
        self.position = 0;
        self.mark = None;
    }

    pub fn set_mark(&mut self) {
        self.mark = Some(self.position);
    }

    /// Restores the position saved by [`Cursors::set_mark`].
    pub fn reset(&mut self) -> Result<(), BufferError> {
        let mark = self
            .mark
            .ok_or(BufferError::InvalidState("reset without a mark"))?;
        self.position = mark;
        Ok(())
    }

    /// State after moving the unread window to the front: position just past
    /// the moved bytes, limit at capacity, mark cleared.
    pub(crate) fn compact(&mut self) {
        self.position = self.remaining();
        self.limit = self.capacity;
        self.mark = None;
    }
}
