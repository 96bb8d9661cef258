//! Copy loops between channels.
//!
//! [`TransferEngine`] drives the buffered loop:
//!
//! ```text
//!            ┌──────────────── Copying ────────────────┐
//!            │ read → flip → write until drained → clear│──┐
//!            └──────────────────────────────────────────┘  │ EndOfData,
//!                         ▲            │                     │ buffers empty
//!                         └────────────┘                     ▼
//!                                                          Done
//! ```
//!
//! With more than one buffer each step is a scatter read followed by a
//! gather write. Channels stay open and owned by the caller in every state.
//!
//! A failed write leaves the unwritten bytes staged. The next step drains
//! them before reading again, so retrying after an error never skips data.
//!
//! For whole-file copies where the extent is known up front, [`copy_mapped`]
//! and [`copy_direct`] avoid the staging buffer entirely; [`CopyStrategy`]
//! names all four approaches.

use std::io;

use conduit_buffer::FixedBuffer;
use conduit_io::{IoBackend, MapMode};

use crate::{Channel, ChannelError, Result};

/// Engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Copying,
    Done,
}

/// Result of one engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// This many bytes went from source to sink.
    Copied(u64),
    /// The source is exhausted.
    Done,
}

/// Counters accumulated by an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Bytes delivered to the sink.
    pub bytes: u64,
    /// Read calls issued to the source.
    pub reads: u64,
    /// Write calls issued to the sink.
    pub writes: u64,
}

/// Buffered copy loop between two channels.
#[derive(Debug)]
pub struct TransferEngine {
    buffers: Vec<FixedBuffer>,
    state: EngineState,
    stats: TransferStats,
    /// Bytes read in the current cycle; non-zero while the buffers are
    /// flipped and being drained.
    staged: u64,
}

impl TransferEngine {
    /// Builds an engine over caller-supplied buffers, all reset to write
    /// mode. More than one buffer selects scatter/gather steps.
    pub fn new(mut buffers: Vec<FixedBuffer>) -> Result<Self> {
        if buffers.is_empty() {
            return Err(ChannelError::InvalidArgument(
                "transfer engine needs at least one buffer".into(),
            ));
        }
        if buffers.iter().all(|buf| buf.capacity() == 0) {
            return Err(ChannelError::InvalidArgument(
                "transfer engine buffers have zero total capacity".into(),
            ));
        }
        if let Some(buf) = buffers.iter().find(|buf| buf.is_read_only()) {
            return Err(ChannelError::InvalidArgument(format!(
                "transfer engine buffer is read-only: {buf:?}"
            )));
        }

        buffers.iter_mut().for_each(FixedBuffer::clear);
        Ok(Self {
            buffers,
            state: EngineState::Copying,
            stats: TransferStats::default(),
            staged: 0,
        })
    }

    /// Single-buffer engine.
    pub fn buffered(capacity: usize, direct: bool) -> Result<Self> {
        Self::new(vec![FixedBuffer::allocate_with(capacity, direct)?])
    }

    /// Scatter/gather engine with one buffer per entry of `sizes`.
    pub fn scatter(sizes: &[usize], direct: bool) -> Result<Self> {
        let buffers = sizes
            .iter()
            .map(|&size| FixedBuffer::allocate_with(size, direct))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::new(buffers)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    pub fn buffers(&self) -> &[FixedBuffer] {
        &self.buffers
    }

    pub fn is_scatter(&self) -> bool {
        self.buffers.len() > 1
    }

    /// Bytes read from the source but not yet written to the sink.
    pub fn pending(&self) -> usize {
        if self.staged == 0 {
            0
        } else {
            self.buffers.iter().map(FixedBuffer::remaining).sum()
        }
    }

    /// Runs one read/flip/write/clear cycle.
    ///
    /// If an earlier step failed while writing, this step resumes the drain
    /// instead of reading. Once the engine is done this returns
    /// [`Step::Done`] without touching either channel.
    pub fn step<S: IoBackend, D: IoBackend>(
        &mut self,
        src: &mut Channel<S>,
        dst: &mut Channel<D>,
    ) -> Result<Step> {
        if self.state == EngineState::Done {
            return Ok(Step::Done);
        }

        if self.staged == 0 {
            let outcome = if let [buffer] = self.buffers.as_mut_slice() {
                src.read(buffer)?
            } else {
                src.read_scatter(&mut self.buffers)?
            };
            self.stats.reads += 1;

            if outcome.is_end_of_data() && self.buffers.iter().all(|buf| buf.position() == 0) {
                self.state = EngineState::Done;
                tracing::debug!(
                    bytes = self.stats.bytes,
                    reads = self.stats.reads,
                    writes = self.stats.writes,
                    "transfer complete"
                );
                return Ok(Step::Done);
            }

            self.buffers.iter_mut().for_each(FixedBuffer::flip);
            self.staged = self.buffers.iter().map(FixedBuffer::remaining).sum::<usize>() as u64;
        } else {
            tracing::debug!(pending = self.pending(), "resuming interrupted drain");
        }

        while self.buffers.iter().any(FixedBuffer::has_remaining) {
            let written = if let [buffer] = self.buffers.as_mut_slice() {
                dst.write(buffer)?
            } else {
                dst.write_gather(&mut self.buffers)?
            };
            self.stats.writes += 1;
            if written == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero).into());
            }
        }

        let copied = std::mem::take(&mut self.staged);
        self.buffers.iter_mut().for_each(FixedBuffer::clear);
        self.stats.bytes += copied;
        Ok(Step::Copied(copied))
    }

    /// Steps until the source is exhausted.
    pub fn run<S: IoBackend, D: IoBackend>(
        &mut self,
        src: &mut Channel<S>,
        dst: &mut Channel<D>,
    ) -> Result<TransferStats> {
        while self.step(src, dst)? != Step::Done {}
        Ok(self.stats)
    }
}

/// How a whole-resource copy moves its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyStrategy {
    /// One staging buffer: read, flip, write, clear.
    Buffered { capacity: usize, direct: bool },
    /// Scatter read into several buffers, gather write out of them.
    Scatter { sizes: Vec<usize>, direct: bool },
    /// Map source and sink in windows of `window` bytes and copy between the
    /// mappings. The sink must be open for reading and writing.
    Mapped { window: usize },
    /// Channel-to-channel transfer, looped until the source is exhausted.
    Direct,
}

impl CopyStrategy {
    /// Direct transfer at or above `threshold` bytes, a buffered loop of
    /// `capacity` bytes below it.
    pub fn auto(size: u64, threshold: u64, capacity: usize, direct: bool) -> Self {
        if size >= threshold {
            Self::Direct
        } else {
            Self::Buffered { capacity, direct }
        }
    }

    /// Copies the whole of `src` into `dst` at its current offset (offset 0
    /// for [`CopyStrategy::Mapped`]). Returns the bytes copied.
    pub fn copy<S: IoBackend, D: IoBackend>(
        &self,
        src: &mut Channel<S>,
        dst: &mut Channel<D>,
    ) -> Result<u64> {
        match self {
            Self::Buffered { capacity, direct } => Ok(TransferEngine::buffered(*capacity, *direct)?
                .run(src, dst)?
                .bytes),
            Self::Scatter { sizes, direct } => {
                Ok(TransferEngine::scatter(sizes, *direct)?.run(src, dst)?.bytes)
            }
            Self::Mapped { window } => copy_mapped(src, dst, *window),
            Self::Direct => copy_direct(src, dst),
        }
    }
}

/// Copies `src` into `dst` through file mappings, `window` bytes at a time.
///
/// `dst` is resized to `src`'s size first and its offset ends at that size.
pub fn copy_mapped<S: IoBackend, D: IoBackend>(
    src: &Channel<S>,
    dst: &mut Channel<D>,
    window: usize,
) -> Result<u64> {
    if window == 0 {
        return Err(ChannelError::InvalidArgument(
            "mapping window must be non-zero".into(),
        ));
    }

    let size = src.size()?;
    dst.set_len(size)?;

    let mut offset = 0;
    while offset < size {
        let len = (size - offset).min(window as u64) as usize;
        let from = src.map(MapMode::ReadOnly, offset, len)?;
        let mut to = dst.map(MapMode::ReadWrite, offset, len)?;
        to.put(from.remaining_slice())?;
        to.flush()?;
        offset += len as u64;
    }

    dst.set_position(size)?;
    tracing::debug!(bytes = size, window, "mapped copy complete");
    Ok(size)
}

/// Copies all of `src` from offset 0 into `dst` with repeated
/// [`Channel::transfer_to`] calls.
pub fn copy_direct<S: IoBackend, D: IoBackend>(
    src: &Channel<S>,
    dst: &mut Channel<D>,
) -> Result<u64> {
    let size = src.size()?;
    let mut offset = 0;
    while offset < size {
        let n = src.transfer_to(offset, size - offset, dst)?;
        if n == 0 {
            break;
        }
        offset += n;
    }

    tracing::debug!(bytes = offset, "direct copy complete");
    Ok(offset)
}
