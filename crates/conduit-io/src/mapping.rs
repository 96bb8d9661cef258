//! Memory-mapped file ranges.
//!
//! A [`Mapping`] owns the memory that aliases a file range. Buffers built on
//! top of it are views; dropping the mapping unmaps the range.

use memmap2::{Mmap, MmapMut};

use crate::IoError;

/// How a file range is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Reads only; writes through the mapping are rejected.
    ReadOnly,
    /// Writes reach the file at flush time or when the mapping is dropped.
    ReadWrite,
    /// Copy-on-write; writes stay private to this mapping.
    Private,
}

#[derive(Debug)]
enum MapInner {
    /// Zero-length range; nothing is mapped.
    Empty,
    ReadOnly(Mmap),
    Writable(MmapMut),
}

/// An owned, mapped file range.
#[derive(Debug)]
pub struct Mapping {
    mode: MapMode,
    offset: u64,
    inner: MapInner,
}

impl Mapping {
    pub(crate) fn empty(mode: MapMode, offset: u64) -> Self {
        Self {
            mode,
            offset,
            inner: MapInner::Empty,
        }
    }

    pub(crate) fn read_only(offset: u64, map: Mmap) -> Self {
        Self {
            mode: MapMode::ReadOnly,
            offset,
            inner: MapInner::ReadOnly(map),
        }
    }

    pub(crate) fn writable(mode: MapMode, offset: u64, map: MmapMut) -> Self {
        debug_assert!(mode != MapMode::ReadOnly);
        Self {
            mode,
            offset,
            inner: MapInner::Writable(map),
        }
    }

    /// Returns the mapping mode.
    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Returns the file offset of the first mapped byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the mapped length in bytes.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the mapping accepts writes.
    pub fn is_writable(&self) -> bool {
        self.mode != MapMode::ReadOnly
    }

    /// Returns the mapped bytes.
    pub fn as_slice(&self) -> &[u8] {
        match &self.inner {
            MapInner::Empty => &[],
            MapInner::ReadOnly(map) => &map[..],
            MapInner::Writable(map) => &map[..],
        }
    }

    /// Returns the mapped bytes mutably, or `None` for a read-only mapping.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match &mut self.inner {
            MapInner::Empty if self.mode != MapMode::ReadOnly => Some(Default::default()),
            MapInner::Writable(map) => Some(&mut map[..]),
            _ => None,
        }
    }

    /// Forces modified pages back to the file.
    ///
    /// No-op for read-only, private and empty mappings.
    pub fn flush(&self) -> Result<(), IoError> {
        match (&self.inner, self.mode) {
            (MapInner::Writable(map), MapMode::ReadWrite) => {
                map.flush()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
