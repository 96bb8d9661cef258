//! # conduit-channel: transfer endpoints and copy loops
//!
//! A [`Channel`] moves bytes between a resource and caller-owned
//! [`FixedBuffer`](conduit_buffer::FixedBuffer)s. It never stores data
//! itself; it tracks an offset into the resource and advances it by exactly
//! the number of bytes moved.
//!
//! ```text
//!   src Channel ──read──▶ FixedBuffer(s) ──flip──▶ write──▶ dst Channel
//!        │                                                     ▲
//!        ├──────────── transfer_to / transfer_from ─────────────┤
//!        └── map ──▶ MappedRegion (FixedBuffer over file bytes) ─┘
//! ```
//!
//! - [`TransferEngine`]: the read/flip/write/clear loop, single buffer or
//!   scatter/gather.
//! - [`copy_mapped`] and [`copy_direct`]: whole-resource copies without a
//!   staging buffer.
//! - [`BufferedWriter`] / [`BufferedReader`]: stream decorators over any
//!   `Write`/`Read`, closing their inner stream exactly once.
//!
//! # Example
//!
//! ```no_run
//! use conduit_channel::{Channel, TransferEngine};
//! use conduit_io::OpenFlags;
//!
//! # fn main() -> conduit_channel::Result<()> {
//! let mut src = Channel::open("in.dat", OpenFlags::read_only())?;
//! let mut dst = Channel::open("out.dat", OpenFlags::create_write())?;
//! let stats = TransferEngine::buffered(1024, false)?.run(&mut src, &mut dst)?;
//! assert_eq!(stats.bytes, src.size()?);
//! # Ok(())
//! # }
//! ```

mod channel;
mod error;
mod mapped;
mod stream;
mod transfer;

pub use channel::{Channel, ReadOutcome};
pub use error::{ChannelError, Result};
pub use mapped::MappedRegion;
pub use stream::{
    BufferedReader, BufferedWriter, Close, DEFAULT_STREAM_BUFFER, FlushPolicy, copy_stream,
};
pub use transfer::{
    CopyStrategy, EngineState, Step, TransferEngine, TransferStats, copy_direct, copy_mapped,
};

#[cfg(test)]
mod tests;
