//! In-memory backend.
//!
//! Resources are byte vectors keyed by path. Useful for exercising channels
//! and transfer loops without touching the file system. Mapping is not
//! supported; transfers use the staged default.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;

use crate::IoError;
use crate::backend::{FileHandle, IoBackend, OpenFlags};

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<PathBuf, Vec<u8>>,
    open: HashMap<u64, PathBuf>,
}

/// Backend whose resources live in process memory.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    next_handle_id: AtomicU64,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            next_handle_id: AtomicU64::new(1),
        }
    }

    /// Adds a resource with the given contents.
    pub fn with_file(self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.files.insert(path.as_ref().to_path_buf(), data.into());
        }
        self
    }

    /// Returns a copy of a resource's contents.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Bytes> {
        let state = self.lock().ok()?;
        state
            .files
            .get(path.as_ref())
            .map(|data| Bytes::copy_from_slice(data))
    }

    /// Returns the number of handles not yet closed.
    pub fn open_handles(&self) -> usize {
        self.lock().map(|state| state.open.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, IoError> {
        self.state
            .lock()
            .map_err(|_| IoError::from(io::Error::other("memory backend lock poisoned")))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryState {
    fn data(&self, handle: &FileHandle) -> Result<&Vec<u8>, IoError> {
        self.open
            .get(&handle.id)
            .and_then(|path| self.files.get(path))
            .ok_or(IoError::InvalidHandle { handle: handle.id })
    }

    fn data_mut(&mut self, handle: &FileHandle) -> Result<&mut Vec<u8>, IoError> {
        let path = self
            .open
            .get(&handle.id)
            .ok_or(IoError::InvalidHandle { handle: handle.id })?;
        self.files
            .get_mut(path)
            .ok_or(IoError::InvalidHandle { handle: handle.id })
    }
}

impl IoBackend for MemoryBackend {
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<FileHandle, IoError> {
        let mut state = self.lock()?;
        match state.files.get_mut(path) {
            Some(data) if flags.truncate => data.clear(),
            Some(_) => {}
            None if flags.create => {
                state.files.insert(path.to_path_buf(), Vec::new());
            }
            None => {
                return Err(IoError::NotFound {
                    path: path.to_path_buf(),
                });
            }
        }

        let id = self.next_handle_id.fetch_add(1, Ordering::Relaxed);
        state.open.insert(id, path.to_path_buf());
        Ok(FileHandle::detached(id, flags))
    }

    fn read_at(&self, handle: &FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        handle.ensure_readable()?;
        let state = self.lock()?;
        let data = state.data(handle)?;

        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, handle: &FileHandle, offset: u64, buf: &[u8]) -> Result<usize, IoError> {
        handle.ensure_writable()?;
        let mut state = self.lock()?;
        let data = state.data_mut(handle)?;

        let start = if handle.flags.append {
            data.len()
        } else {
            usize::try_from(offset)
                .map_err(|_| IoError::from(io::Error::from(io::ErrorKind::InvalidInput)))?
        };
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn fsync(&self, handle: &FileHandle) -> Result<(), IoError> {
        self.lock()?.data(handle).map(|_| ())
    }

    fn close(&self, handle: FileHandle) -> Result<(), IoError> {
        self.lock()?
            .open
            .remove(&handle.id)
            .map(|_| ())
            .ok_or(IoError::InvalidHandle { handle: handle.id })
    }

    fn file_size(&self, handle: &FileHandle) -> Result<u64, IoError> {
        Ok(self.lock()?.data(handle)?.len() as u64)
    }

    fn set_len(&self, handle: &FileHandle, len: u64) -> Result<(), IoError> {
        handle.ensure_writable()?;
        let len = usize::try_from(len)
            .map_err(|_| IoError::from(io::Error::from(io::ErrorKind::InvalidInput)))?;
        self.lock()?.data_mut(handle)?.resize(len, 0);
        Ok(())
    }

    fn read_all(&self, path: &Path) -> Result<Bytes, IoError> {
        self.contents(path).ok_or_else(|| IoError::NotFound {
            path: path.to_path_buf(),
        })
    }

    fn write_all(&self, path: &Path, data: &[u8]) -> Result<(), IoError> {
        self.lock()?.files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }
}
