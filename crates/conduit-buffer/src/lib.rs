//! # conduit-buffer: Fixed-Capacity Staging Buffers
//!
//! A [`FixedBuffer`] is the staging area every channel transfer goes
//! through. Its state is four cursors held in one [`Cursors`] value:
//!
//! ```text
//!  0 <= mark <= position <= limit <= capacity
//!
//!  ┌──────────── read/written ────────────┬──── remaining ────┬─────────┐
//!  0                                   position             limit   capacity
//! ```
//!
//! Storage is chosen at construction ([`StorageKind`]) and never changes
//! behaviour: heap, direct (anonymous mapping), or a mapped file range.

mod buffer;
mod cursor;
mod error;
mod storage;

pub use buffer::FixedBuffer;
pub use cursor::Cursors;
pub use error::BufferError;
pub use storage::StorageKind;
