//! # Conduit
//!
//! Fixed-capacity buffers, file channels and the copy loops between them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           conduit                            │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐  │
//! │  │ FixedBuffer  │ ⇄ │     Channel      │ ⇄ │  IoBackend   │  │
//! │  │ heap/direct/ │   │ read/write/map/  │   │ std::fs +    │  │
//! │  │ mapped       │   │ transfer         │   │ memmap2      │  │
//! │  └──────────────┘   └──────────────────┘   └──────────────┘  │
//! │          ▲                   ▲                               │
//! │          └── TransferEngine ─┘   BufferedReader/Writer       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use conduit::{ConduitConfig, copy_file};
//!
//! # fn main() -> conduit::Result<()> {
//! let config = ConduitConfig::default();
//! let report = copy_file("in.dat", "out.dat", &config)?;
//! println!("{} bytes via {:?}", report.bytes, report.strategy);
//! # Ok(())
//! # }
//! ```
//!
//! Lower-level pieces are re-exported from the member crates:
//! `conduit-io` (backends), `conduit-buffer` (cursors and storage),
//! `conduit-channel` (channels, engine, decorators) and `conduit-config`.

use std::io::{Read, Write};
use std::path::Path;

mod copy;
mod error;

pub use copy::{CopyReport, copy_file, strategy_for};
pub use error::{ConduitError, Result};

// Re-export resource provider types
pub use conduit_io::{
    FileHandle, IoBackend, IoError, MapMode, Mapping, MemoryBackend, OpenFlags, SyncBackend,
};

// Re-export buffers
pub use conduit_buffer::{BufferError, Cursors, FixedBuffer, StorageKind};

// Re-export channels, copy loops and stream decorators
pub use conduit_channel::{
    BufferedReader, BufferedWriter, Channel, ChannelError, Close, CopyStrategy, EngineState,
    FlushPolicy, MappedRegion, ReadOutcome, Step, TransferEngine, TransferStats, copy_direct,
    copy_mapped, copy_stream,
};

// Re-export configuration
pub use conduit_config::{
    BufferConfig, ConduitConfig, ConfigError, ConfigLoader, CopyStrategyKind, FlushMode,
    StreamConfig, TransferConfig,
};

/// Allocates a buffer in write mode; `direct` places it off-heap.
pub fn allocate(capacity: usize, direct: bool) -> Result<FixedBuffer> {
    Ok(FixedBuffer::allocate_with(capacity, direct)?)
}

/// Opens a file channel on the shared synchronous backend.
pub fn open(path: impl AsRef<Path>, flags: OpenFlags) -> Result<Channel> {
    Ok(Channel::open(path, flags)?)
}

pub fn flush_policy(mode: FlushMode) -> FlushPolicy {
    match mode {
        FlushMode::OnClose => FlushPolicy::OnClose,
        FlushMode::EveryWrite => FlushPolicy::EveryWrite,
    }
}

/// Wraps `inner` in a writer sized and flushed per `config`.
pub fn buffered_writer<W: Write>(inner: W, config: &StreamConfig) -> Result<BufferedWriter<W>> {
    Ok(BufferedWriter::with_capacity(
        inner,
        config.buffer_size,
        flush_policy(config.flush),
    )?)
}

pub fn buffered_reader<R: Read>(inner: R, config: &StreamConfig) -> Result<BufferedReader<R>> {
    Ok(BufferedReader::with_capacity(inner, config.buffer_size)?)
}
