//! Mapped file regions.
//!
//! A [`MappedRegion`] is a [`FixedBuffer`] whose storage is the file's own
//! bytes. `get` reads the file and `put` writes it; there is no staging copy
//! between the view and the file.

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use conduit_buffer::FixedBuffer;
use conduit_io::{MapMode, Mapping};

use crate::Result;

/// A buffer view over a mapped range of a channel's resource.
///
/// Borrows the originating channel: the channel cannot be closed, read or
/// written through `&mut` while a region is alive. Writable regions flush
/// when dropped.
#[derive(Debug)]
pub struct MappedRegion<'ch> {
    buffer: FixedBuffer,
    offset: u64,
    mode: MapMode,
    _channel: PhantomData<&'ch ()>,
}

impl MappedRegion<'_> {
    pub(crate) fn new(mapping: Mapping) -> Self {
        let offset = mapping.offset();
        let mode = mapping.mode();
        Self {
            buffer: FixedBuffer::from_mapping(mapping),
            offset,
            mode,
            _channel: PhantomData,
        }
    }

    /// File offset of the first mapped byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Mapped length in bytes; equal to the view's capacity.
    pub fn len(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forces modified pages back to the file. No-op unless read-write.
    pub fn flush(&self) -> Result<()> {
        if let Some(mapping) = self.buffer.mapping() {
            mapping.flush()?;
        }
        Ok(())
    }
}

impl Deref for MappedRegion<'_> {
    type Target = FixedBuffer;

    fn deref(&self) -> &FixedBuffer {
        &self.buffer
    }
}

impl DerefMut for MappedRegion<'_> {
    fn deref_mut(&mut self) -> &mut FixedBuffer {
        &mut self.buffer
    }
}

impl Drop for MappedRegion<'_> {
    fn drop(&mut self) {
        if self.mode != MapMode::ReadWrite {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::error!(offset = self.offset, error = %e, "failed to flush mapped region on drop");
        }
    }
}
