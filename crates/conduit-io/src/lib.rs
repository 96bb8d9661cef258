//! # conduit-io: Resource Provider for Conduit Channels
//!
//! This crate provides a trait-based abstraction over byte resources
//! addressed by offset, so channels can move data without knowing what
//! backs them:
//!
//! - **`SyncBackend`** (default): `std::fs` positional I/O, `memmap2`
//!   mappings, and kernel-assisted transfers where the platform offers them
//! - **`MemoryBackend`**: resources held in process memory, for tests and
//!   for callers that stage data before it reaches disk
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │     conduit-channel      │
//! │   (uses IoBackend trait) │
//! └────────────┬─────────────┘
//!              │
//! ┌────────────┴─────────────┐
//! │        conduit-io        │
//! │  ┌─────────┐  ┌────────┐ │
//! │  │  Sync   │  │ Memory │ │
//! │  │ Backend │  │Backend │ │
//! │  └─────────┘  └────────┘ │
//! └──────────────────────────┘
//! ```

mod backend;
mod error;
mod mapping;
mod memory_backend;
mod sync_backend;

pub use backend::{FileHandle, IoBackend, OpenFlags, TRANSFER_CHUNK, staged_transfer};
pub use error::IoError;
pub use mapping::{MapMode, Mapping};
pub use memory_backend::MemoryBackend;
pub use sync_backend::{MAX_TRANSFER_CHUNK, SyncBackend};
