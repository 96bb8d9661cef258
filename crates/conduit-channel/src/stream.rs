//! Buffered stream decorators.
//!
//! [`BufferedWriter`] and [`BufferedReader`] wrap any `Write`/`Read` and stage
//! bytes in a [`FixedBuffer`]. Each owns its inner stream exclusively.
//! Closing a decorator flushes it and closes the inner stream exactly once,
//! so a stack of decorators over a [`Channel`] releases the channel once no
//! matter which layer is closed.

use std::io::{self, BufRead, Read, Write};

use conduit_buffer::FixedBuffer;
use conduit_io::IoBackend;

use crate::{Channel, ChannelError, Result};

/// Default staging size for the stream decorators.
pub const DEFAULT_STREAM_BUFFER: usize = 8 * 1024;

/// A resource that can be released explicitly.
///
/// Implementations must be idempotent: a second close is a no-op.
pub trait Close {
    fn close(&mut self) -> io::Result<()>;
}

impl<B: IoBackend> Close for Channel<B> {
    fn close(&mut self) -> io::Result<()> {
        Ok(Channel::close(self)?)
    }
}

/// When a [`BufferedWriter`] pushes staged bytes to its inner writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushPolicy {
    /// After every `write` call.
    EveryWrite,
    /// When the buffer fills, on `flush`, and on close.
    #[default]
    OnClose,
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream is closed")
}

/// Write decorator staging bytes in a [`FixedBuffer`].
pub struct BufferedWriter<W: Write> {
    inner: Option<W>,
    buffer: FixedBuffer,
    policy: FlushPolicy,
}

impl<W: Write> BufferedWriter<W> {
    pub fn new(inner: W) -> Result<Self> {
        Self::with_capacity(inner, DEFAULT_STREAM_BUFFER, FlushPolicy::default())
    }

    pub fn with_capacity(inner: W, capacity: usize, policy: FlushPolicy) -> Result<Self> {
        Ok(Self {
            inner: Some(inner),
            buffer: FixedBuffer::allocate(capacity)?,
            policy,
        })
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Bytes staged but not yet written to the inner stream.
    pub fn buffered(&self) -> usize {
        self.buffer.position()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// The inner writer, or `None` once closed.
    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }

    /// Flushes staged bytes and hands the inner writer back without
    /// closing it.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush_buffer()?;
        self.inner.take().ok_or_else(closed)
    }

    /// Writes out staged bytes. On failure the bytes the inner writer did
    /// accept are dropped from the buffer; only the rest stay staged.
    fn flush_buffer(&mut self) -> io::Result<()> {
        let inner = self.inner.as_mut().ok_or_else(closed)?;
        let staged = self.buffer.position();
        if staged == 0 {
            return Ok(());
        }

        self.buffer.flip();
        let mut result = Ok(());
        while self.buffer.has_remaining() {
            match inner.write(self.buffer.remaining_slice()) {
                Ok(0) => {
                    result = Err(io::Error::from(io::ErrorKind::WriteZero));
                    break;
                }
                Ok(n) => {
                    if let Err(e) = self.buffer.advance(n) {
                        result = Err(io::Error::other(e));
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        let drained = staged - self.buffer.remaining();
        self.buffer.compact().map_err(io::Error::other)?;
        tracing::trace!(bytes = drained, left = self.buffer.position(), "buffered writer drained");
        result
    }
}

impl<W: Write + Close> BufferedWriter<W> {
    /// Flushes, then closes the inner writer.
    pub fn close(mut self) -> io::Result<()> {
        Close::close(&mut self)
    }
}

impl<W: Write> Write for BufferedWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.inner.is_none() {
            return Err(closed());
        }
        if data.len() > self.buffer.remaining() {
            self.flush_buffer()?;
        }

        let n = if data.len() >= self.buffer.capacity() {
            self.inner.as_mut().ok_or_else(closed)?.write(data)?
        } else {
            self.buffer.put(data).map_err(io::Error::other)?;
            data.len()
        };

        if self.policy == FlushPolicy::EveryWrite {
            self.flush()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.inner.as_mut().ok_or_else(closed)?.flush()
    }
}

impl<W: Write + Close> Close for BufferedWriter<W> {
    fn close(&mut self) -> io::Result<()> {
        if self.inner.is_none() {
            return Ok(());
        }
        let flushed = self.flush();
        let mut inner = self.inner.take().ok_or_else(closed)?;
        let released = inner.close();
        flushed.and(released)
    }
}

impl<W: Write> Drop for BufferedWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some()
            && let Err(e) = self.flush()
        {
            tracing::error!(error = %e, "failed to flush buffered writer on drop");
        }
    }
}

impl<W: Write> std::fmt::Debug for BufferedWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedWriter")
            .field("open", &self.inner.is_some())
            .field("buffered", &self.buffered())
            .field("capacity", &self.capacity())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Read decorator refilling a [`FixedBuffer`] from its inner reader.
pub struct BufferedReader<R: Read> {
    inner: Option<R>,
    buffer: FixedBuffer,
}

impl<R: Read> BufferedReader<R> {
    pub fn new(inner: R) -> Result<Self> {
        Self::with_capacity(inner, DEFAULT_STREAM_BUFFER)
    }

    /// Fails for a zero capacity, which could never hold a byte.
    pub fn with_capacity(inner: R, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ChannelError::InvalidArgument(
                "buffered reader capacity must be non-zero".into(),
            ));
        }
        let mut buffer = FixedBuffer::allocate(capacity)?;
        // Start drained: nothing to read until the first refill.
        buffer.set_limit(0)?;
        Ok(Self {
            inner: Some(inner),
            buffer,
        })
    }

    /// Bytes read from the inner stream but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.remaining()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn get_ref(&self) -> Option<&R> {
        self.inner.as_ref()
    }

    /// Hands the inner reader back. Buffered bytes are discarded.
    pub fn into_inner(mut self) -> io::Result<R> {
        self.inner.take().ok_or_else(closed)
    }
}

impl<R: Read + Close> BufferedReader<R> {
    pub fn close(mut self) -> io::Result<()> {
        Close::close(&mut self)
    }
}

impl<R: Read> Read for BufferedReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if !self.buffer.has_remaining() && out.len() >= self.buffer.capacity() {
            return self.inner.as_mut().ok_or_else(closed)?.read(out);
        }

        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for BufferedReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let inner = self.inner.as_mut().ok_or_else(closed)?;
        if !self.buffer.has_remaining() {
            self.buffer.clear();
            let n = inner.read(self.buffer.remaining_slice_mut().map_err(io::Error::other)?)?;
            self.buffer.advance(n).map_err(io::Error::other)?;
            self.buffer.flip();
        }
        Ok(self.buffer.remaining_slice())
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.buffer.remaining());
        let _ = self.buffer.advance(amt);
    }
}

impl<R: Read + Close> Close for BufferedReader<R> {
    fn close(&mut self) -> io::Result<()> {
        match self.inner.take() {
            Some(mut inner) => {
                self.buffer.clear();
                self.buffer.set_limit(0).map_err(io::Error::other)?;
                inner.close()
            }
            None => Ok(()),
        }
    }
}

impl<R: Read> std::fmt::Debug for BufferedReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedReader")
            .field("open", &self.inner.is_some())
            .field("buffered", &self.buffered())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Copies `reader` into `writer` through a `chunk`-byte buffer until
/// `reader` is exhausted. Returns the bytes copied.
pub fn copy_stream<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    chunk: usize,
) -> io::Result<u64> {
    if chunk == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "copy chunk must be non-zero",
        ));
    }

    let mut buffer = FixedBuffer::allocate(chunk).map_err(io::Error::other)?;
    let mut total = 0u64;
    loop {
        let n = match reader.read(buffer.remaining_slice_mut().map_err(io::Error::other)?) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        buffer.advance(n).map_err(io::Error::other)?;
        buffer.flip();
        writer.write_all(buffer.remaining_slice())?;
        buffer.clear();
        total += n as u64;
    }
    writer.flush()?;
    Ok(total)
}
