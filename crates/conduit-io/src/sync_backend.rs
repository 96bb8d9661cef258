//! Synchronous backend using `std::fs` and `memmap2`.
//!
//! Positional reads and writes use `pread`/`pwrite` on Unix and
//! `seek_read`/`seek_write` on Windows, so the OS file cursor is never
//! shared state between callers. Transfers go through `std::io::copy`,
//! which uses `copy_file_range`/`sendfile` on Linux when both ends are
//! files and falls back to a userspace copy elsewhere.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use memmap2::MmapOptions;

use crate::backend::{FileHandle, IoBackend, OpenFlags};
use crate::{IoError, MapMode, Mapping};

/// Largest range moved by a single [`SyncBackend::transfer`] call (8 MiB).
pub const MAX_TRANSFER_CHUNK: u64 = 8 * 1024 * 1024;

/// Synchronous backend over `std::fs::File`.
///
/// All operations block and go through the OS page cache.
#[derive(Debug)]
pub struct SyncBackend {
    /// Counter for generating unique file handle IDs.
    next_handle_id: AtomicU64,
}

impl SyncBackend {
    /// Creates a new synchronous backend.
    pub fn new() -> Self {
        Self {
            next_handle_id: AtomicU64::new(1),
        }
    }

    /// Returns the next unique handle ID.
    fn next_id(&self) -> u64 {
        self.next_handle_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SyncBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn pread(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn pread(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(unix)]
fn pwrite(file: &File, offset: u64, buf: &[u8]) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn pwrite(file: &File, offset: u64, buf: &[u8]) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}

impl IoBackend for SyncBackend {
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<FileHandle, IoError> {
        let file = OpenOptions::new()
            .read(flags.read)
            .write(flags.write)
            .create(flags.create)
            .append(flags.append)
            .truncate(flags.truncate)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => IoError::NotFound {
                    path: path.to_path_buf(),
                },
                _ => IoError::from(e),
            })?;

        let id = self.next_id();
        tracing::debug!(handle = id, path = %path.display(), ?flags, "opened file");
        Ok(FileHandle::from_file(id, flags, file))
    }

    fn read_at(&self, handle: &FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        handle.ensure_readable()?;
        let n = pread(handle.file()?, offset, buf)?;
        Ok(n)
    }

    fn write_at(&self, handle: &FileHandle, offset: u64, buf: &[u8]) -> Result<usize, IoError> {
        handle.ensure_writable()?;
        let mut file = handle.file()?;
        let n = if handle.flags.append {
            file.write(buf)?
        } else {
            pwrite(file, offset, buf)?
        };
        Ok(n)
    }

    fn fsync(&self, handle: &FileHandle) -> Result<(), IoError> {
        handle.file()?.sync_all()?;
        Ok(())
    }

    fn close(&self, mut handle: FileHandle) -> Result<(), IoError> {
        // Dropping the file closes the descriptor
        let file = handle
            .file
            .take()
            .ok_or(IoError::InvalidHandle { handle: handle.id })?;
        drop(file);
        tracing::debug!(handle = handle.id, "closed file");
        Ok(())
    }

    fn file_size(&self, handle: &FileHandle) -> Result<u64, IoError> {
        let metadata = handle.file()?.metadata()?;
        Ok(metadata.len())
    }

    fn set_len(&self, handle: &FileHandle, len: u64) -> Result<(), IoError> {
        handle.ensure_writable()?;
        handle.file()?.set_len(len)?;
        Ok(())
    }

    #[allow(unsafe_code)]
    fn map(
        &self,
        handle: &FileHandle,
        mode: MapMode,
        offset: u64,
        len: usize,
    ) -> Result<Mapping, IoError> {
        handle.ensure_readable()?;
        if mode == MapMode::ReadWrite {
            handle.ensure_writable()?;
        }

        let file = handle.file()?;
        let size = file.metadata()?.len();
        let end = offset.checked_add(len as u64);
        if end.is_none_or(|end| end > size) {
            return Err(IoError::OutOfRange {
                offset,
                len: len as u64,
                size,
            });
        }

        if len == 0 {
            return Ok(Mapping::empty(mode, offset));
        }

        let mut options = MmapOptions::new();
        options.offset(offset).len(len);

        // SAFETY: the range was checked against the file size above and the
        // mapping keeps its own reference to the file. Concurrent truncation
        // by another process is outside what this backend guards against.
        let mapping = match mode {
            MapMode::ReadOnly => Mapping::read_only(offset, unsafe { options.map(file)? }),
            MapMode::ReadWrite => Mapping::writable(mode, offset, unsafe { options.map_mut(file)? }),
            MapMode::Private => Mapping::writable(mode, offset, unsafe { options.map_copy(file)? }),
        };

        tracing::debug!(handle = handle.id, ?mode, offset, len, "mapped file range");
        Ok(mapping)
    }

    fn transfer(
        &self,
        src: &FileHandle,
        src_offset: u64,
        dst: &FileHandle,
        dst_offset: u64,
        len: u64,
    ) -> Result<u64, IoError> {
        src.ensure_readable()?;
        dst.ensure_writable()?;

        // Channels address files by explicit offset, so the OS cursor is
        // free to be positioned for the copy.
        let mut reader = src.file()?;
        let mut writer = dst.file()?;
        reader.seek(SeekFrom::Start(src_offset))?;
        if !dst.flags.append {
            writer.seek(SeekFrom::Start(dst_offset))?;
        }

        let mut limited = reader.take(len.min(MAX_TRANSFER_CHUNK));
        let n = io::copy(&mut limited, &mut writer)?;
        tracing::trace!(src = src.id, dst = dst.id, src_offset, dst_offset, n, "transferred");
        Ok(n)
    }

    fn read_all(&self, path: &Path) -> Result<Bytes, IoError> {
        let data = fs::read(path)?;
        Ok(Bytes::from(data))
    }

    fn write_all(&self, path: &Path, data: &[u8]) -> Result<(), IoError> {
        fs::write(path, data)?;
        Ok(())
    }
}
