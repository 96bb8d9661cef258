//! Backing storage strategies.
//!
//! A buffer's behaviour does not depend on where its bytes live; only
//! construction cost and what else can alias the bytes do. [`Storage`] picks
//! one of three homes at construction time:
//!
//! - **Heap**: a boxed slice from the global allocator. Cheapest to create.
//! - **Direct**: an anonymous page-aligned mapping outside the allocator.
//!   Costs a syscall to create; suited to long-lived, reused buffers.
//! - **Mapped**: a file range owned by a [`Mapping`]. The bytes *are* the
//!   file's bytes.

use conduit_io::Mapping;
use memmap2::MmapMut;

use crate::BufferError;

/// Where a buffer's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Heap,
    Direct,
    Mapped,
}

#[derive(Debug)]
pub(crate) struct DirectStorage {
    map: MmapMut,
    len: usize,
}

#[derive(Debug)]
pub(crate) enum Storage {
    Heap(Box<[u8]>),
    Direct(DirectStorage),
    Mapped(Mapping),
}

impl Storage {
    pub(crate) fn heap(capacity: usize) -> Result<Self, BufferError> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(capacity).map_err(|e| {
            BufferError::InvalidArgument(format!("cannot allocate {capacity} bytes: {e}"))
        })?;
        bytes.resize(capacity, 0);
        Ok(Self::Heap(bytes.into_boxed_slice()))
    }

    pub(crate) fn direct(capacity: usize) -> Result<Self, BufferError> {
        // Anonymous mappings cannot be empty; map a single page-backed byte
        // and expose none of it.
        let map = MmapMut::map_anon(capacity.max(1)).map_err(|e| {
            BufferError::InvalidArgument(format!("cannot map {capacity} direct bytes: {e}"))
        })?;
        Ok(Self::Direct(DirectStorage { map, len: capacity }))
    }

    pub(crate) fn kind(&self) -> StorageKind {
        match self {
            Self::Heap(_) => StorageKind::Heap,
            Self::Direct(_) => StorageKind::Direct,
            Self::Mapped(_) => StorageKind::Mapped,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub(crate) fn is_read_only(&self) -> bool {
        matches!(self, Self::Mapped(mapping) if !mapping.is_writable())
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            Self::Heap(bytes) => &bytes[..],
            Self::Direct(direct) => &direct.map[..direct.len],
            Self::Mapped(mapping) => mapping.as_slice(),
        }
    }

    pub(crate) fn as_mut_slice(&mut self) -> Result<&mut [u8], BufferError> {
        match self {
            Self::Heap(bytes) => Ok(&mut bytes[..]),
            Self::Direct(direct) => Ok(&mut direct.map[..direct.len]),
            Self::Mapped(mapping) => mapping.as_mut_slice().ok_or(BufferError::ReadOnly),
        }
    }

    pub(crate) fn mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapped(mapping) => Some(mapping),
            _ => None,
        }
    }
}
