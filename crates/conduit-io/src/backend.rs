//! Resource provider trait.
//!
//! The [`IoBackend`] trait is the narrow contract channels depend on:
//! open a resource, read and write at explicit offsets, query and change its
//! size, and release it. Two optional capabilities sit on top:
//! - [`IoBackend::map`] for aliasing a file range as memory
//! - [`IoBackend::transfer`] for moving bytes between two resources without
//!   a caller-visible staging buffer
//!
//! Channels never look at paths beyond handing them to [`IoBackend::open`].

use std::io;
use std::path::Path;

use bytes::Bytes;

use crate::{IoError, MapMode, Mapping};

/// Largest staging chunk used by [`staged_transfer`].
pub const TRANSFER_CHUNK: usize = 64 * 1024;

/// Flags for opening a resource.
///
/// Flags combine: `OpenFlags::write_only().with_create()` opens for writing
/// and creates the resource if it is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Create the resource if it doesn't exist.
    pub create: bool,
    /// Every write lands at the current end of the resource.
    pub append: bool,
    /// Discard existing contents on open.
    pub truncate: bool,
}

impl OpenFlags {
    /// Flags for reading an existing resource.
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    /// Flags for writing an existing resource.
    pub fn write_only() -> Self {
        Self {
            write: true,
            ..Self::default()
        }
    }

    /// Flags for reading and writing an existing resource.
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Self::default()
        }
    }

    /// Flags for replacing a resource: write, create if absent, truncate.
    pub fn create_write() -> Self {
        Self {
            write: true,
            create: true,
            truncate: true,
            ..Self::default()
        }
    }

    /// Adds create-if-absent.
    pub fn with_create(mut self) -> Self {
        self.create = true;
        self
    }

    /// Adds append mode.
    pub fn with_append(mut self) -> Self {
        self.append = true;
        self
    }

    /// Adds truncate-on-open.
    pub fn with_truncate(mut self) -> Self {
        self.truncate = true;
        self
    }
}

/// Opaque handle to an open resource.
///
/// For [`SyncBackend`](crate::SyncBackend) the handle owns a
/// `std::fs::File`; for [`MemoryBackend`](crate::MemoryBackend) it is only an
/// identifier. The handle must be released via [`IoBackend::close`].
#[derive(Debug)]
pub struct FileHandle {
    /// Backend-unique identifier.
    pub(crate) id: u64,
    /// Flags the resource was opened with.
    pub(crate) flags: OpenFlags,
    /// The open file (sync backend only).
    pub(crate) file: Option<std::fs::File>,
}

impl FileHandle {
    /// Creates a handle wrapping a `std::fs::File`.
    pub(crate) fn from_file(id: u64, flags: OpenFlags, file: std::fs::File) -> Self {
        Self {
            id,
            flags,
            file: Some(file),
        }
    }

    /// Creates a handle with no OS file behind it.
    pub(crate) fn detached(id: u64, flags: OpenFlags) -> Self {
        Self {
            id,
            flags,
            file: None,
        }
    }

    /// Returns the backend-unique identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the flags the resource was opened with.
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// Returns the internal file reference.
    pub(crate) fn file(&self) -> Result<&std::fs::File, IoError> {
        self.file
            .as_ref()
            .ok_or(IoError::InvalidHandle { handle: self.id })
    }

    pub(crate) fn ensure_readable(&self) -> Result<(), IoError> {
        if self.flags.read {
            Ok(())
        } else {
            Err(IoError::NotReadable { handle: self.id })
        }
    }

    pub(crate) fn ensure_writable(&self) -> Result<(), IoError> {
        if self.flags.write || self.flags.append {
            Ok(())
        } else {
            Err(IoError::NotWritable { handle: self.id })
        }
    }
}

/// Abstraction over a byte source/sink addressed by offset.
///
/// All methods are synchronous and block until the operation completes or
/// fails. Short reads and writes are reported as-is; looping is the
/// caller's job.
pub trait IoBackend: Send + Sync {
    /// Opens a resource with the given flags.
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<FileHandle, IoError>;

    /// Reads up to `buf.len()` bytes at `offset`.
    ///
    /// Returns the number of bytes read; 0 means the offset is at or past
    /// the end of the resource.
    fn read_at(&self, handle: &FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize, IoError>;

    /// Writes `buf` at `offset` (at the end in append mode).
    ///
    /// Returns the number of bytes written, which may be short.
    fn write_at(&self, handle: &FileHandle, offset: u64, buf: &[u8]) -> Result<usize, IoError>;

    /// Syncs data and metadata to durable storage.
    fn fsync(&self, handle: &FileHandle) -> Result<(), IoError>;

    /// Releases a handle.
    fn close(&self, handle: FileHandle) -> Result<(), IoError>;

    /// Returns the resource size in bytes.
    fn file_size(&self, handle: &FileHandle) -> Result<u64, IoError>;

    /// Truncates or zero-extends the resource to `len` bytes.
    fn set_len(&self, handle: &FileHandle, len: u64) -> Result<(), IoError>;

    /// Maps `[offset, offset + len)` of the resource into memory.
    fn map(
        &self,
        handle: &FileHandle,
        mode: MapMode,
        offset: u64,
        len: usize,
    ) -> Result<Mapping, IoError> {
        let _ = (handle, mode, offset, len);
        Err(IoError::Unsupported { operation: "map" })
    }

    /// Moves up to `len` bytes from `src` at `src_offset` to `dst` at
    /// `dst_offset`.
    ///
    /// Returns the number of bytes moved; may be less than `len`, and 0 once
    /// `src_offset` reaches the end of `src`. The default stages one chunk
    /// through a temporary buffer.
    fn transfer(
        &self,
        src: &FileHandle,
        src_offset: u64,
        dst: &FileHandle,
        dst_offset: u64,
        len: u64,
    ) -> Result<u64, IoError> {
        staged_transfer(self, src, src_offset, self, dst, dst_offset, len)
    }

    /// Reads an entire resource into memory.
    fn read_all(&self, path: &Path) -> Result<Bytes, IoError>;

    /// Replaces a resource's contents.
    fn write_all(&self, path: &Path, data: &[u8]) -> Result<(), IoError>;
}

/// Copies one chunk of at most [`TRANSFER_CHUNK`] bytes through a temporary
/// buffer using only `read_at`/`write_at`.
///
/// The two handles may belong to different backends.
pub fn staged_transfer<S: IoBackend + ?Sized, D: IoBackend + ?Sized>(
    src_backend: &S,
    src: &FileHandle,
    src_offset: u64,
    dst_backend: &D,
    dst: &FileHandle,
    dst_offset: u64,
    len: u64,
) -> Result<u64, IoError> {
    let chunk = len.min(TRANSFER_CHUNK as u64) as usize;
    if chunk == 0 {
        return Ok(0);
    }

    let mut staging = vec![0u8; chunk];
    let n = src_backend.read_at(src, src_offset, &mut staging)?;

    let mut written = 0;
    while written < n {
        let w = dst_backend.write_at(dst, dst_offset + written as u64, &staging[written..n])?;
        if w == 0 {
            return Err(io::Error::from(io::ErrorKind::WriteZero).into());
        }
        written += w;
    }

    Ok(n as u64)
}
