//! File-backed channels.
//!
//! A [`Channel`] is a transfer endpoint bound to one resource. It stores no
//! data of its own: every read lands in a caller's [`FixedBuffer`] and every
//! write drains one. The channel tracks a byte offset into the resource and
//! advances it by exactly the number of bytes moved.
//!
//! # Closing
//!
//! `close` is idempotent. Once closed, every other operation returns
//! [`ChannelError::Closed`]. Dropping an open channel closes it.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use conduit_buffer::FixedBuffer;
use conduit_io::{
    FileHandle, IoBackend, IoError, MapMode, OpenFlags, SyncBackend, staged_transfer,
};

use crate::mapped::MappedRegion;
use crate::{ChannelError, Result};

/// Result of a read into one or more buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were transferred (0 if the buffers had no room).
    Data(usize),
    /// The channel is exhausted and nothing was transferred.
    EndOfData,
}

impl ReadOutcome {
    /// Bytes transferred; 0 for end of data.
    pub fn bytes(self) -> usize {
        match self {
            Self::Data(n) => n,
            Self::EndOfData => 0,
        }
    }

    pub fn is_end_of_data(self) -> bool {
        self == Self::EndOfData
    }
}

/// Process-wide backend for channels opened without an explicit one.
///
/// Sharing one instance lets [`Channel::transfer_to`] recognise two file
/// channels as the same backend and take the kernel copy path.
fn default_backend() -> Arc<SyncBackend> {
    static BACKEND: OnceLock<Arc<SyncBackend>> = OnceLock::new();
    Arc::clone(BACKEND.get_or_init(|| Arc::new(SyncBackend::new())))
}

fn open_handle(handle: &Option<FileHandle>) -> Result<&FileHandle> {
    handle.as_ref().ok_or(ChannelError::Closed)
}

fn same_backend<S, D>(a: &Arc<S>, b: &Arc<D>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

/// A transfer endpoint over one backend resource.
pub struct Channel<B: IoBackend = SyncBackend> {
    backend: Arc<B>,
    handle: Option<FileHandle>,
    flags: OpenFlags,
    path: PathBuf,
    offset: u64,
}

impl Channel<SyncBackend> {
    /// Opens a file channel on the shared [`SyncBackend`].
    pub fn open(path: impl AsRef<Path>, flags: OpenFlags) -> Result<Self> {
        Self::open_with(default_backend(), path, flags)
    }
}

impl<B: IoBackend> Channel<B> {
    /// Opens a channel on an explicit backend.
    pub fn open_with(backend: Arc<B>, path: impl AsRef<Path>, flags: OpenFlags) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let handle = backend.open(&path, flags)?;
        let offset = if flags.append {
            backend.file_size(&handle)?
        } else {
            0
        };

        tracing::debug!(handle = handle.id(), path = %path.display(), "channel opened");
        Ok(Self {
            backend,
            handle: Some(handle),
            flags,
            path,
            offset,
        })
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Current byte offset into the resource.
    pub fn position(&self) -> Result<u64> {
        open_handle(&self.handle)?;
        Ok(self.offset)
    }

    /// Moves the offset. Reading past the end yields end of data; writing
    /// past the end zero-fills the gap.
    pub fn set_position(&mut self, offset: u64) -> Result<()> {
        open_handle(&self.handle)?;
        self.offset = offset;
        Ok(())
    }

    /// Current size of the resource in bytes.
    pub fn size(&self) -> Result<u64> {
        let handle = open_handle(&self.handle)?;
        Ok(self.backend.file_size(handle)?)
    }

    /// Truncates or zero-extends the resource. An offset beyond the new size
    /// is pulled back to it.
    pub fn set_len(&mut self, len: u64) -> Result<()> {
        let handle = open_handle(&self.handle)?;
        self.backend.set_len(handle, len)?;
        self.offset = self.offset.min(len);
        Ok(())
    }

    /// Forces written data to durable storage.
    pub fn force(&self) -> Result<()> {
        let handle = open_handle(&self.handle)?;
        Ok(self.backend.fsync(handle)?)
    }

    /// Reads into `[position, limit)` of `buf` from the channel offset.
    ///
    /// Never transfers more than `buf.remaining()`. Returns
    /// [`ReadOutcome::EndOfData`] only if `buf` had room and the channel
    /// had nothing left.
    pub fn read(&mut self, buf: &mut FixedBuffer) -> Result<ReadOutcome> {
        open_handle(&self.handle)?;
        if !buf.has_remaining() {
            return Ok(ReadOutcome::Data(0));
        }

        let n = self.read_slice(buf.remaining_slice_mut()?)?;
        buf.advance(n)?;
        Ok(if n == 0 {
            ReadOutcome::EndOfData
        } else {
            ReadOutcome::Data(n)
        })
    }

    /// Scatter read: fills `bufs` in order, each completely before the next,
    /// until every buffer is full or the channel is exhausted.
    pub fn read_scatter(&mut self, bufs: &mut [FixedBuffer]) -> Result<ReadOutcome> {
        open_handle(&self.handle)?;
        let wanted = bufs.iter().any(FixedBuffer::has_remaining);

        let mut total = 0;
        for buf in bufs.iter_mut().filter(|buf| buf.has_remaining()) {
            let room = buf.remaining();
            let n = self.read_slice(buf.remaining_slice_mut()?)?;
            buf.advance(n)?;
            total += n;
            if n < room {
                break;
            }
        }

        Ok(if wanted && total == 0 {
            ReadOutcome::EndOfData
        } else {
            ReadOutcome::Data(total)
        })
    }

    /// Writes `[position, limit)` of `buf` at the channel offset.
    ///
    /// Returns the bytes written, which may be short; `buf` keeps whatever
    /// was not written.
    pub fn write(&mut self, buf: &mut FixedBuffer) -> Result<usize> {
        let n = self.write_slice(buf.remaining_slice())?;
        buf.advance(n)?;
        Ok(n)
    }

    /// Gather write: drains `bufs` in order, stopping at the first short
    /// write.
    pub fn write_gather(&mut self, bufs: &mut [FixedBuffer]) -> Result<usize> {
        open_handle(&self.handle)?;
        let mut total = 0;
        for buf in bufs.iter_mut().filter(|buf| buf.has_remaining()) {
            let pending = buf.remaining();
            let n = self.write(buf)?;
            total += n;
            if n < pending {
                break;
            }
        }
        Ok(total)
    }

    fn read_slice(&mut self, out: &mut [u8]) -> Result<usize> {
        let handle = open_handle(&self.handle)?;
        let n = self.backend.read_at(handle, self.offset, out)?;
        self.offset += n as u64;
        tracing::trace!(handle = handle.id(), n, offset = self.offset, "channel read");
        Ok(n)
    }

    fn write_slice(&mut self, data: &[u8]) -> Result<usize> {
        let handle = open_handle(&self.handle)?;
        if data.is_empty() {
            return Ok(0);
        }
        let id = handle.id();
        let n = self.backend.write_at(handle, self.offset, data)?;
        self.note_written(n as u64)?;
        tracing::trace!(handle = id, n, offset = self.offset, "channel write");
        Ok(n)
    }

    /// Advances the offset past `n` written bytes; in append mode the offset
    /// follows the end of the resource instead.
    fn note_written(&mut self, n: u64) -> Result<()> {
        self.offset = if self.flags.append {
            let handle = open_handle(&self.handle)?;
            self.backend.file_size(handle)?
        } else {
            self.offset + n
        };
        Ok(())
    }

    /// Moves up to `len` bytes starting at `offset` of this channel into
    /// `dst` at its current offset.
    ///
    /// This channel's offset is unchanged; `dst`'s advances by the returned
    /// count. The count may be less than `len`; 0 means `offset` is at or
    /// past the end of this channel.
    pub fn transfer_to<D: IoBackend>(
        &self,
        offset: u64,
        len: u64,
        dst: &mut Channel<D>,
    ) -> Result<u64> {
        let src_handle = open_handle(&self.handle)?;
        let dst_handle = open_handle(&dst.handle)?;

        let n = if same_backend(&self.backend, &dst.backend) {
            self.backend
                .transfer(src_handle, offset, dst_handle, dst.offset, len)?
        } else {
            tracing::warn!(
                src = src_handle.id(),
                dst = dst_handle.id(),
                "channels use different backends, staging transfer"
            );
            staged_transfer(
                &*self.backend,
                src_handle,
                offset,
                &*dst.backend,
                dst_handle,
                dst.offset,
                len,
            )?
        };

        dst.note_written(n)?;
        Ok(n)
    }

    /// Moves up to `len` bytes from `src` at its current offset into this
    /// channel at `offset`.
    ///
    /// `src`'s offset advances by the returned count; this channel's is
    /// unchanged. Returns 0 if `offset` is beyond this channel's size.
    pub fn transfer_from<S: IoBackend>(
        &mut self,
        src: &mut Channel<S>,
        offset: u64,
        len: u64,
    ) -> Result<u64> {
        let dst_handle = open_handle(&self.handle)?;
        let src_handle = open_handle(&src.handle)?;
        if offset > self.backend.file_size(dst_handle)? {
            return Ok(0);
        }

        let n = if same_backend(&self.backend, &src.backend) {
            self.backend
                .transfer(src_handle, src.offset, dst_handle, offset, len)?
        } else {
            staged_transfer(
                &*src.backend,
                src_handle,
                src.offset,
                &*self.backend,
                dst_handle,
                offset,
                len,
            )?
        };

        src.offset += n;
        Ok(n)
    }

    /// Maps `[offset, offset + len)` of the resource.
    ///
    /// The region borrows the channel, so the channel cannot be closed while
    /// the region is alive.
    pub fn map(&self, mode: MapMode, offset: u64, len: usize) -> Result<MappedRegion<'_>> {
        let handle = open_handle(&self.handle)?;
        let size = self.backend.file_size(handle)?;
        if offset.checked_add(len as u64).is_none_or(|end| end > size) {
            return Err(ChannelError::InvalidArgument(format!(
                "cannot map {len} bytes at offset {offset} of a {size}-byte resource"
            )));
        }

        let mapping = self
            .backend
            .map(handle, mode, offset, len)
            .map_err(|e| match e {
                IoError::OutOfRange { .. } => ChannelError::InvalidArgument(e.to_string()),
                other => ChannelError::Io(other),
            })?;
        Ok(MappedRegion::new(mapping))
    }

    /// Releases the resource. Closing a closed channel succeeds.
    pub fn close(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            let id = handle.id();
            self.backend.close(handle)?;
            tracing::debug!(handle = id, path = %self.path.display(), "channel closed");
        }
        Ok(())
    }
}

impl<B: IoBackend> Drop for Channel<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(path = %self.path.display(), error = %e, "failed to close channel on drop");
        }
    }
}

impl<B: IoBackend> std::fmt::Debug for Channel<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("offset", &self.offset)
            .field("flags", &self.flags)
            .finish()
    }
}

impl<B: IoBackend> io::Read for Channel<B> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_slice(out)?)
    }
}

impl<B: IoBackend> io::Write for Channel<B> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        Ok(self.write_slice(data)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        open_handle(&self.handle)?;
        Ok(())
    }
}
