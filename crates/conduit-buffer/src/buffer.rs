//! The cursor-tracked staging buffer.

use std::fmt;

use bytes::Bytes;
use conduit_io::Mapping;

use crate::storage::Storage;
use crate::{BufferError, Cursors, StorageKind};

/// A fixed-capacity byte buffer with position, limit and mark.
///
/// One allocation serves both phases of a transfer: bytes are `put` while
/// the buffer is in write mode, [`flip`](Self::flip) switches to read mode
/// over exactly those bytes, and [`clear`](Self::clear) returns to write
/// mode. Mode switches only move cursors; no bytes are copied.
///
/// ```
/// use conduit_buffer::FixedBuffer;
///
/// let mut buf = FixedBuffer::allocate(16)?;
/// buf.put(b"hello")?;
/// buf.flip();
/// assert_eq!(&buf.get(5)?[..], b"hello");
/// # Ok::<(), conduit_buffer::BufferError>(())
/// ```
pub struct FixedBuffer {
    cursors: Cursors,
    storage: Storage,
}

impl FixedBuffer {
    /// Allocates a heap buffer in write mode.
    pub fn allocate(capacity: usize) -> Result<Self, BufferError> {
        Ok(Self::with_storage(Storage::heap(capacity)?))
    }

    /// Allocates a direct buffer in write mode.
    ///
    /// Creation costs a mapping syscall; prefer it for buffers that are
    /// reused many times or handed to direct transfers.
    pub fn allocate_direct(capacity: usize) -> Result<Self, BufferError> {
        let buffer = Self::with_storage(Storage::direct(capacity)?);
        tracing::trace!(capacity, "allocated direct buffer");
        Ok(buffer)
    }

    /// Allocates a direct buffer when `direct` is set, a heap buffer
    /// otherwise.
    pub fn allocate_with(capacity: usize, direct: bool) -> Result<Self, BufferError> {
        if direct {
            Self::allocate_direct(capacity)
        } else {
            Self::allocate(capacity)
        }
    }

    /// Wraps existing bytes. The buffer starts full: position 0, limit and
    /// capacity equal to `bytes.len()`.
    pub fn wrap(bytes: Vec<u8>) -> Self {
        Self::with_storage(Storage::Heap(bytes.into_boxed_slice()))
    }

    /// Builds a view over a mapped file range. The buffer covers the whole
    /// mapping and starts in write mode.
    pub fn from_mapping(mapping: Mapping) -> Self {
        Self::with_storage(Storage::Mapped(mapping))
    }

    fn with_storage(storage: Storage) -> Self {
        Self {
            cursors: Cursors::new(storage.len()),
            storage,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cursors.capacity()
    }

    pub fn position(&self) -> usize {
        self.cursors.position()
    }

    pub fn limit(&self) -> usize {
        self.cursors.limit()
    }

    /// Returns the marked position, if any.
    pub fn mark_position(&self) -> Option<usize> {
        self.cursors.mark()
    }

    /// Returns a copy of all four cursors.
    pub fn cursors(&self) -> Cursors {
        self.cursors
    }

    /// `limit - position`.
    pub fn remaining(&self) -> usize {
        self.cursors.remaining()
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// True for storage outside the global allocator (direct and mapped).
    pub fn is_direct(&self) -> bool {
        self.storage.kind() != StorageKind::Heap
    }

    pub fn is_read_only(&self) -> bool {
        self.storage.is_read_only()
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.storage.kind()
    }

    /// Returns the mapping behind a mapped buffer.
    pub fn mapping(&self) -> Option<&Mapping> {
        self.storage.mapping()
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), BufferError> {
        self.cursors.set_position(position)
    }

    pub fn set_limit(&mut self, limit: usize) -> Result<(), BufferError> {
        self.cursors.set_limit(limit)
    }

    /// Copies `src` in at the position and advances past it.
    ///
    /// Fails with [`BufferError::Overflow`] if `src` is longer than
    /// `remaining()`; nothing is written in that case.
    pub fn put(&mut self, src: &[u8]) -> Result<(), BufferError> {
        let dst = self.remaining_slice_mut()?;
        if src.len() > dst.len() {
            return Err(BufferError::Overflow {
                requested: src.len(),
                remaining: dst.len(),
            });
        }
        dst[..src.len()].copy_from_slice(src);
        self.cursors.advance(src.len())
    }

    pub fn put_u8(&mut self, byte: u8) -> Result<(), BufferError> {
        self.put(&[byte])
    }

    /// Returns the next `count` bytes and advances past them.
    pub fn get(&mut self, count: usize) -> Result<Bytes, BufferError> {
        let window = self.take_window(count)?;
        Ok(Bytes::copy_from_slice(window))
    }

    /// Fills `dst` from the position and advances past the copied bytes.
    pub fn get_into(&mut self, dst: &mut [u8]) -> Result<(), BufferError> {
        let window = self.take_window(dst.len())?;
        dst.copy_from_slice(window);
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8, BufferError> {
        let window = self.take_window(1)?;
        Ok(window[0])
    }

    /// Advances the position and returns the bytes stepped over.
    fn take_window(&mut self, count: usize) -> Result<&[u8], BufferError> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(BufferError::Underflow {
                requested: count,
                remaining,
            });
        }
        let start = self.position();
        self.cursors.advance(count)?;
        Ok(&self.storage.as_slice()[start..start + count])
    }

    /// `limit = position; position = 0`; mark cleared.
    pub fn flip(&mut self) {
        self.cursors.flip();
    }

    /// `position = 0`; mark cleared; limit kept, so the same extent can be
    /// read again.
    pub fn rewind(&mut self) {
        self.cursors.rewind();
    }

    /// `position = 0; limit = capacity`; mark cleared. Bytes stay in place
    /// until overwritten.
    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    pub fn mark(&mut self) {
        self.cursors.set_mark();
    }

    /// Restores the marked position; [`BufferError::InvalidState`] without a
    /// mark.
    pub fn reset(&mut self) -> Result<(), BufferError> {
        self.cursors.reset()
    }

    /// Moves the unread bytes `[position, limit)` to the front and switches
    /// to write mode after them.
    pub fn compact(&mut self) -> Result<(), BufferError> {
        let (start, end) = (self.position(), self.limit());
        self.storage.as_mut_slice()?.copy_within(start..end, 0);
        self.cursors.compact();
        Ok(())
    }

    /// Returns the whole storage, `[0, capacity)`.
    pub fn as_slice(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Returns `[position, limit)`.
    pub fn remaining_slice(&self) -> &[u8] {
        &self.storage.as_slice()[self.position()..self.limit()]
    }

    /// Returns `[position, limit)` for writing in place. Pair with
    /// [`advance`](Self::advance) once bytes have been written.
    pub fn remaining_slice_mut(&mut self) -> Result<&mut [u8], BufferError> {
        let (start, end) = (self.position(), self.limit());
        Ok(&mut self.storage.as_mut_slice()?[start..end])
    }

    /// Advances the position by `n` without touching the bytes.
    pub fn advance(&mut self, n: usize) -> Result<(), BufferError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(BufferError::Underflow {
                requested: n,
                remaining,
            });
        }
        self.cursors.advance(n)
    }
}

impl fmt::Debug for FixedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedBuffer")
            .field("kind", &self.storage_kind())
            .field("position", &self.position())
            .field("limit", &self.limit())
            .field("capacity", &self.capacity())
            .field("mark", &self.mark_position())
            .finish()
    }
}
