//! Unit and property tests for conduit-channel.

use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;
use conduit_buffer::{BufferError, FixedBuffer};
use conduit_io::{MapMode, MemoryBackend, OpenFlags};
use proptest::prelude::*;
use tempfile::TempDir;
use test_case::test_case;

use crate::{
    BufferedReader, BufferedWriter, Channel, ChannelError, Close, CopyStrategy, EngineState,
    FlushPolicy, ReadOutcome, Step, TransferEngine, copy_direct, copy_mapped, copy_stream,
};

fn memory_with(data: &[u8]) -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new().with_file("src", data.to_vec()))
}

fn memory_pair(backend: &Arc<MemoryBackend>) -> (Channel<MemoryBackend>, Channel<MemoryBackend>) {
    let src = Channel::open_with(Arc::clone(backend), "src", OpenFlags::read_only()).unwrap();
    let dst = Channel::open_with(Arc::clone(backend), "dst", OpenFlags::create_write()).unwrap();
    (src, dst)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn file_with(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, data).unwrap();
    path
}

fn read_write_create() -> OpenFlags {
    OpenFlags::read_write().with_create().with_truncate()
}

// ============================================================================
// Channel reads and writes
// ============================================================================

#[test]
fn read_fills_remaining_and_advances_offset() {
    let backend = memory_with(b"ABCDEFGHIJ");
    let (mut src, _dst) = memory_pair(&backend);
    let mut buf = FixedBuffer::allocate(4).unwrap();

    assert_eq!(src.read(&mut buf).unwrap(), ReadOutcome::Data(4));
    assert_eq!(buf.position(), 4);
    assert_eq!(src.position().unwrap(), 4);

    buf.flip();
    assert_eq!(buf.get(4).unwrap(), Bytes::from_static(b"ABCD"));
}

#[test]
fn read_into_full_buffer_moves_nothing() {
    let backend = memory_with(b"ABCDEFGHIJ");
    let (mut src, _dst) = memory_pair(&backend);
    let mut buf = FixedBuffer::allocate(2).unwrap();
    buf.put(b"xy").unwrap();

    assert_eq!(src.read(&mut buf).unwrap(), ReadOutcome::Data(0));
    assert_eq!(src.position().unwrap(), 0);
}

#[test]
fn read_at_end_reports_end_of_data() {
    let backend = memory_with(b"AB");
    let (mut src, _dst) = memory_pair(&backend);
    let mut buf = FixedBuffer::allocate(8).unwrap();

    assert_eq!(src.read(&mut buf).unwrap(), ReadOutcome::Data(2));
    let before = buf.cursors();
    assert_eq!(src.read(&mut buf).unwrap(), ReadOutcome::EndOfData);
    assert_eq!(buf.cursors(), before);
}

#[test]
fn write_drains_buffer_at_offset() {
    let backend = memory_with(b"");
    let (_src, mut dst) = memory_pair(&backend);
    let mut buf = FixedBuffer::wrap(b"hello".to_vec());

    assert_eq!(dst.write(&mut buf).unwrap(), 5);
    assert!(!buf.has_remaining());
    assert_eq!(dst.position().unwrap(), 5);
    assert_eq!(backend.contents("dst").unwrap(), Bytes::from_static(b"hello"));
}

#[test]
fn write_past_end_zero_fills() {
    let backend = memory_with(b"");
    let (_src, mut dst) = memory_pair(&backend);
    dst.set_position(3).unwrap();

    dst.write(&mut FixedBuffer::wrap(b"z".to_vec())).unwrap();
    assert_eq!(backend.contents("dst").unwrap(), Bytes::from_static(b"\0\0\0z"));
}

#[test]
fn scatter_fills_in_order_and_gather_reproduces() {
    let backend = memory_with(b"0123456789ABCDEF");
    let (mut src, mut dst) = memory_pair(&backend);
    let mut bufs = vec![
        FixedBuffer::allocate(3).unwrap(),
        FixedBuffer::allocate(5).unwrap(),
    ];

    assert_eq!(src.read_scatter(&mut bufs).unwrap(), ReadOutcome::Data(8));
    assert_eq!(&bufs[0].as_slice()[..3], b"012");
    assert_eq!(&bufs[1].as_slice()[..5], b"34567");

    bufs.iter_mut().for_each(FixedBuffer::flip);
    assert_eq!(dst.write_gather(&mut bufs).unwrap(), 8);
    assert_eq!(backend.contents("dst").unwrap(), Bytes::from_static(b"01234567"));
}

#[test]
fn scatter_stops_at_end_of_data() {
    let backend = memory_with(b"0123");
    let (mut src, _dst) = memory_pair(&backend);
    let mut bufs = vec![
        FixedBuffer::allocate(3).unwrap(),
        FixedBuffer::allocate(3).unwrap(),
    ];

    assert_eq!(src.read_scatter(&mut bufs).unwrap(), ReadOutcome::Data(4));
    assert_eq!((bufs[0].position(), bufs[1].position()), (3, 1));
    assert_eq!(src.read_scatter(&mut bufs).unwrap(), ReadOutcome::EndOfData);
}

#[test]
fn append_channel_starts_and_stays_at_end() {
    let backend = Arc::new(MemoryBackend::new().with_file("log", b"abc".to_vec()));
    let mut log = Channel::open_with(
        Arc::clone(&backend),
        "log",
        OpenFlags::write_only().with_append(),
    )
    .unwrap();

    assert_eq!(log.position().unwrap(), 3);
    log.write(&mut FixedBuffer::wrap(b"de".to_vec())).unwrap();
    assert_eq!(log.position().unwrap(), 5);
    assert_eq!(backend.contents("log").unwrap(), Bytes::from_static(b"abcde"));
}

#[test]
fn set_len_pulls_offset_back() {
    let backend = memory_with(b"");
    let (_src, mut dst) = memory_pair(&backend);
    dst.write(&mut FixedBuffer::wrap(pattern(10))).unwrap();

    dst.set_len(4).unwrap();
    assert_eq!(dst.size().unwrap(), 4);
    assert_eq!(dst.position().unwrap(), 4);
}

#[test]
fn channel_implements_std_io() {
    let backend = memory_with(b"streamed bytes");
    let (mut src, mut dst) = memory_pair(&backend);

    let mut out = Vec::new();
    src.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"streamed bytes");

    dst.write_all(b"abc").unwrap();
    dst.flush().unwrap();
    assert_eq!(backend.contents("dst").unwrap(), Bytes::from_static(b"abc"));
}

#[test]
fn open_missing_without_create_fails() {
    let dir = TempDir::new().unwrap();
    let err = Channel::open(dir.path().join("missing"), OpenFlags::read_only()).unwrap_err();
    assert!(matches!(err, ChannelError::Io(conduit_io::IoError::NotFound { .. })));
}

// ============================================================================
// Closing
// ============================================================================

#[test]
fn close_is_idempotent_and_releases_handle() {
    let backend = memory_with(b"data");
    let (mut src, mut dst) = memory_pair(&backend);
    assert_eq!(backend.open_handles(), 2);

    src.close().unwrap();
    src.close().unwrap();
    dst.close().unwrap();
    assert!(!src.is_open());
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn operations_after_close_fail() {
    let backend = memory_with(b"data");
    let (mut src, mut dst) = memory_pair(&backend);
    src.close().unwrap();
    dst.close().unwrap();

    let mut buf = FixedBuffer::allocate(4).unwrap();
    assert!(matches!(src.read(&mut buf), Err(ChannelError::Closed)));
    assert!(matches!(src.size(), Err(ChannelError::Closed)));
    assert!(matches!(src.position(), Err(ChannelError::Closed)));
    assert!(matches!(dst.write(&mut buf), Err(ChannelError::Closed)));
    assert!(matches!(dst.write_gather(&mut []), Err(ChannelError::Closed)));
    assert!(matches!(dst.force(), Err(ChannelError::Closed)));
    assert!(matches!(src.map(MapMode::ReadOnly, 0, 1), Err(ChannelError::Closed)));
}

#[test]
fn drop_closes_channel() {
    let backend = memory_with(b"data");
    {
        let _pair = memory_pair(&backend);
        assert_eq!(backend.open_handles(), 2);
    }
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn closed_channel_maps_to_not_connected() {
    let err: io::Error = ChannelError::Closed.into();
    assert_eq!(err.kind(), io::ErrorKind::NotConnected);
}

// ============================================================================
// Mapped regions
// ============================================================================

#[test]
fn read_only_region_reads_file_bytes() {
    let dir = TempDir::new().unwrap();
    let path = file_with(&dir, "map.dat", b"hello world");
    let channel = Channel::open(&path, OpenFlags::read_only()).unwrap();

    let mut region = channel.map(MapMode::ReadOnly, 6, 5).unwrap();
    assert_eq!((region.offset(), region.len()), (6, 5));
    assert_eq!(region.get(5).unwrap(), Bytes::from_static(b"world"));

    region.rewind();
    assert_eq!(region.put(b"x"), Err(BufferError::ReadOnly));
}

#[test]
fn read_write_region_reaches_file() {
    let dir = TempDir::new().unwrap();
    let path = file_with(&dir, "map.dat", b"hello world");
    let channel = Channel::open(&path, OpenFlags::read_write()).unwrap();

    {
        let mut region = channel.map(MapMode::ReadWrite, 0, 5).unwrap();
        region.put(b"HELLO").unwrap();
    }

    assert_eq!(fs::read(&path).unwrap(), b"HELLO world");
}

#[test]
fn private_region_does_not_reach_file() {
    let dir = TempDir::new().unwrap();
    let path = file_with(&dir, "map.dat", b"hello world");
    let channel = Channel::open(&path, OpenFlags::read_only()).unwrap();

    let mut region = channel.map(MapMode::Private, 0, 5).unwrap();
    region.put(b"HELLO").unwrap();
    region.flip();
    assert_eq!(region.get(5).unwrap(), Bytes::from_static(b"HELLO"));
    drop(region);

    assert_eq!(fs::read(&path).unwrap(), b"hello world");
}

#[test_case(0, 12; "longer than file")]
#[test_case(11, 1; "starts at end")]
#[test_case(u64::MAX, 1; "offset overflow")]
fn map_past_end_is_rejected(offset: u64, len: usize) {
    let dir = TempDir::new().unwrap();
    let path = file_with(&dir, "map.dat", b"hello world");
    let channel = Channel::open(&path, OpenFlags::read_only()).unwrap();

    assert!(matches!(
        channel.map(MapMode::ReadOnly, offset, len),
        Err(ChannelError::InvalidArgument(_))
    ));
}

#[test]
fn read_write_map_needs_writable_channel() {
    let dir = TempDir::new().unwrap();
    let path = file_with(&dir, "map.dat", b"hello");
    let channel = Channel::open(&path, OpenFlags::read_only()).unwrap();

    assert!(matches!(
        channel.map(MapMode::ReadWrite, 0, 5),
        Err(ChannelError::Io(conduit_io::IoError::NotWritable { .. }))
    ));
}

#[test]
fn empty_region_at_end_is_allowed() {
    let dir = TempDir::new().unwrap();
    let path = file_with(&dir, "map.dat", b"hello");
    let channel = Channel::open(&path, OpenFlags::read_only()).unwrap();

    let region = channel.map(MapMode::ReadOnly, 5, 0).unwrap();
    assert!(region.is_empty());
    assert!(!region.has_remaining());
}

// ============================================================================
// Channel-to-channel transfer
// ============================================================================

#[test]
fn transfer_to_leaves_source_offset() {
    let dir = TempDir::new().unwrap();
    let src_path = file_with(&dir, "src", b"abcdefgh");
    let dst_path = dir.path().join("dst");
    let src = Channel::open(&src_path, OpenFlags::read_only()).unwrap();
    let mut dst = Channel::open(&dst_path, OpenFlags::create_write()).unwrap();

    assert_eq!(src.transfer_to(2, 4, &mut dst).unwrap(), 4);
    assert_eq!(src.position().unwrap(), 0);
    assert_eq!(dst.position().unwrap(), 4);
    assert_eq!(src.transfer_to(8, 4, &mut dst).unwrap(), 0);

    drop(dst);
    assert_eq!(fs::read(&dst_path).unwrap(), b"cdef");
}

#[test]
fn transfer_from_advances_source_offset() {
    let dir = TempDir::new().unwrap();
    let src_path = file_with(&dir, "src", b"abcdefgh");
    let dst_path = file_with(&dir, "dst", b"________");
    let mut src = Channel::open(&src_path, OpenFlags::read_only()).unwrap();
    let mut dst = Channel::open(&dst_path, OpenFlags::read_write()).unwrap();
    src.set_position(5).unwrap();

    assert_eq!(dst.transfer_from(&mut src, 1, 3).unwrap(), 3);
    assert_eq!(src.position().unwrap(), 8);
    assert_eq!(dst.position().unwrap(), 0);
    assert_eq!(dst.transfer_from(&mut src, 100, 3).unwrap(), 0);

    drop(dst);
    assert_eq!(fs::read(&dst_path).unwrap(), b"_fgh____");
}

#[test]
fn transfer_across_backends_is_staged() {
    let dir = TempDir::new().unwrap();
    let dst_path = dir.path().join("dst");
    let backend = memory_with(b"from memory");
    let src = Channel::open_with(backend, "src", OpenFlags::read_only()).unwrap();
    let mut dst = Channel::open(&dst_path, OpenFlags::create_write()).unwrap();

    assert_eq!(src.transfer_to(0, 64, &mut dst).unwrap(), 11);
    drop(dst);
    assert_eq!(fs::read(&dst_path).unwrap(), b"from memory");
}

// ============================================================================
// Transfer engine
// ============================================================================

#[test]
fn engine_steps_through_source() {
    let backend = memory_with(b"ABCDEFGHIJ");
    let (mut src, mut dst) = memory_pair(&backend);
    let mut engine = TransferEngine::buffered(4, false).unwrap();

    assert_eq!(engine.step(&mut src, &mut dst).unwrap(), Step::Copied(4));
    assert_eq!(engine.step(&mut src, &mut dst).unwrap(), Step::Copied(4));
    assert_eq!(engine.step(&mut src, &mut dst).unwrap(), Step::Copied(2));
    assert_eq!(engine.state(), EngineState::Copying);
    assert_eq!(engine.step(&mut src, &mut dst).unwrap(), Step::Done);
    assert_eq!(engine.state(), EngineState::Done);
    assert_eq!(engine.step(&mut src, &mut dst).unwrap(), Step::Done);

    let stats = engine.stats();
    assert_eq!((stats.bytes, stats.reads, stats.writes), (10, 4, 3));
    assert_eq!(backend.contents("dst").unwrap(), Bytes::from_static(b"ABCDEFGHIJ"));
    assert!(src.is_open() && dst.is_open());
}

#[test_case(1; "one byte")]
#[test_case(7; "odd size")]
#[test_case(1000; "exact fit")]
#[test_case(1001; "one over")]
#[test_case(1024; "larger")]
fn engine_copies_exactly_for_any_capacity(capacity: usize) {
    let data = pattern(1000);
    let backend = memory_with(&data);
    let (mut src, mut dst) = memory_pair(&backend);

    let stats = TransferEngine::buffered(capacity, false)
        .unwrap()
        .run(&mut src, &mut dst)
        .unwrap();

    assert_eq!(stats.bytes, 1000);
    assert_eq!(backend.contents("dst").unwrap(), Bytes::from(data));
}

#[test_case(false; "heap")]
#[test_case(true; "direct")]
fn engine_on_empty_source_is_done_immediately(direct: bool) {
    let backend = memory_with(b"");
    let (mut src, mut dst) = memory_pair(&backend);
    let mut engine = TransferEngine::buffered(16, direct).unwrap();

    assert_eq!(engine.step(&mut src, &mut dst).unwrap(), Step::Done);
    assert_eq!(engine.stats().writes, 0);
    assert_eq!(backend.contents("dst").unwrap().len(), 0);
}

#[test]
fn scatter_engine_preserves_order() {
    let data = pattern(100);
    let backend = memory_with(&data);
    let (mut src, mut dst) = memory_pair(&backend);

    let mut engine = TransferEngine::scatter(&[3, 5], false).unwrap();
    assert!(engine.is_scatter());
    assert_eq!(engine.step(&mut src, &mut dst).unwrap(), Step::Copied(8));
    engine.run(&mut src, &mut dst).unwrap();

    assert_eq!(engine.stats().bytes, 100);
    assert_eq!(backend.contents("dst").unwrap(), Bytes::from(data));
}

#[test]
fn engine_rejects_unusable_buffers() {
    assert!(matches!(
        TransferEngine::new(Vec::new()),
        Err(ChannelError::InvalidArgument(_))
    ));
    assert!(matches!(
        TransferEngine::buffered(0, false),
        Err(ChannelError::InvalidArgument(_))
    ));
    assert!(matches!(
        TransferEngine::scatter(&[0, 0], false),
        Err(ChannelError::InvalidArgument(_))
    ));
}

#[test]
fn engine_clears_supplied_buffers() {
    let mut dirty = FixedBuffer::allocate(8).unwrap();
    dirty.put(b"junk").unwrap();

    let engine = TransferEngine::new(vec![dirty]).unwrap();
    assert_eq!(engine.buffers()[0].position(), 0);
    assert_eq!(engine.buffers()[0].limit(), 8);
}

#[test]
fn engine_fails_when_source_closed() {
    let backend = memory_with(b"ABCD");
    let (mut src, mut dst) = memory_pair(&backend);
    src.close().unwrap();

    let mut engine = TransferEngine::buffered(4, false).unwrap();
    assert!(matches!(engine.step(&mut src, &mut dst), Err(ChannelError::Closed)));
}

#[test]
fn engine_resumes_drain_after_failed_write() {
    let backend = memory_with(b"ABCDEFGHIJ");
    let (mut src, mut dead) = memory_pair(&backend);
    dead.close().unwrap();
    let mut engine = TransferEngine::buffered(4, false).unwrap();

    assert!(matches!(engine.step(&mut src, &mut dead), Err(ChannelError::Closed)));
    assert_eq!(engine.state(), EngineState::Copying);
    assert_eq!(engine.pending(), 4);
    assert_eq!(engine.stats().bytes, 0);

    let mut retry =
        Channel::open_with(Arc::clone(&backend), "retry", OpenFlags::create_write()).unwrap();
    assert_eq!(engine.step(&mut src, &mut retry).unwrap(), Step::Copied(4));
    assert_eq!(engine.pending(), 0);
    assert_eq!(src.position().unwrap(), 4);

    let stats = engine.run(&mut src, &mut retry).unwrap();
    assert_eq!(stats.bytes, 10);
    assert_eq!(backend.contents("retry").unwrap(), Bytes::from_static(b"ABCDEFGHIJ"));
}

#[test]
fn scatter_engine_resumes_drain_after_failed_write() {
    let data = pattern(50);
    let backend = memory_with(&data);
    let (mut src, mut dead) = memory_pair(&backend);
    dead.close().unwrap();
    let mut engine = TransferEngine::scatter(&[3, 5], false).unwrap();

    assert!(engine.step(&mut src, &mut dead).is_err());
    assert_eq!(engine.pending(), 8);

    let mut retry =
        Channel::open_with(Arc::clone(&backend), "retry", OpenFlags::create_write()).unwrap();
    assert_eq!(engine.run(&mut src, &mut retry).unwrap().bytes, 50);
    assert_eq!(backend.contents("retry").unwrap(), Bytes::from(data));
}

// ============================================================================
// Whole-file copies
// ============================================================================

#[test_case(0; "empty")]
#[test_case(100; "smaller than window")]
#[test_case(10_000; "several windows")]
fn copy_mapped_reproduces_source(len: usize) {
    let dir = TempDir::new().unwrap();
    let data = pattern(len);
    let src_path = file_with(&dir, "src", &data);
    let dst_path = dir.path().join("dst");
    let src = Channel::open(&src_path, OpenFlags::read_only()).unwrap();
    let mut dst = Channel::open(&dst_path, read_write_create()).unwrap();

    assert_eq!(copy_mapped(&src, &mut dst, 4096).unwrap(), len as u64);
    assert_eq!(dst.position().unwrap(), len as u64);

    drop(dst);
    assert_eq!(fs::read(&dst_path).unwrap(), data);
}

#[test]
fn copy_mapped_rejects_zero_window() {
    let dir = TempDir::new().unwrap();
    let src_path = file_with(&dir, "src", b"abc");
    let src = Channel::open(&src_path, OpenFlags::read_only()).unwrap();
    let mut dst = Channel::open(dir.path().join("dst"), read_write_create()).unwrap();

    assert!(matches!(
        copy_mapped(&src, &mut dst, 0),
        Err(ChannelError::InvalidArgument(_))
    ));
}

#[test]
fn copy_direct_reproduces_source() {
    let dir = TempDir::new().unwrap();
    let data = pattern(200_000);
    let src_path = file_with(&dir, "src", &data);
    let dst_path = dir.path().join("dst");
    let src = Channel::open(&src_path, OpenFlags::read_only()).unwrap();
    let mut dst = Channel::open(&dst_path, OpenFlags::create_write()).unwrap();

    assert_eq!(copy_direct(&src, &mut dst).unwrap(), 200_000);
    drop(dst);
    assert_eq!(fs::read(&dst_path).unwrap(), data);
}

#[test_case(CopyStrategy::Buffered { capacity: 333, direct: false }; "buffered")]
#[test_case(CopyStrategy::Buffered { capacity: 333, direct: true }; "buffered direct")]
#[test_case(CopyStrategy::Scatter { sizes: vec![100, 1024], direct: false }; "scatter")]
#[test_case(CopyStrategy::Mapped { window: 1000 }; "mapped")]
#[test_case(CopyStrategy::Direct; "direct")]
fn every_strategy_copies_exactly(strategy: CopyStrategy) {
    let dir = TempDir::new().unwrap();
    let data = pattern(5000);
    let src_path = file_with(&dir, "src", &data);
    let dst_path = dir.path().join("dst");
    let mut src = Channel::open(&src_path, OpenFlags::read_only()).unwrap();
    let mut dst = Channel::open(&dst_path, read_write_create()).unwrap();

    assert_eq!(strategy.copy(&mut src, &mut dst).unwrap(), 5000);
    drop(dst);
    assert_eq!(fs::read(&dst_path).unwrap(), data);
}

#[test]
fn auto_strategy_switches_at_threshold() {
    assert_eq!(CopyStrategy::auto(1024, 1024, 64, false), CopyStrategy::Direct);
    assert_eq!(
        CopyStrategy::auto(1023, 1024, 64, true),
        CopyStrategy::Buffered {
            capacity: 64,
            direct: true
        }
    );
}

// ============================================================================
// Stream decorators
// ============================================================================

#[derive(Debug, Default)]
struct SinkLog {
    data: Vec<u8>,
    writes: usize,
    closes: usize,
}

/// Writer that records every call into a shared log.
#[derive(Debug, Clone, Default)]
struct Sink(Rc<RefCell<SinkLog>>);

impl Sink {
    fn data(&self) -> Vec<u8> {
        self.0.borrow().data.clone()
    }

    fn writes(&self) -> usize {
        self.0.borrow().writes
    }

    fn closes(&self) -> usize {
        self.0.borrow().closes
    }
}

impl Write for Sink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut log = self.0.borrow_mut();
        log.writes += 1;
        log.data.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for Sink {
    fn close(&mut self) -> io::Result<()> {
        self.0.borrow_mut().closes += 1;
        Ok(())
    }
}

/// Writer that accepts `budget` bytes, fails once, then accepts everything.
struct Choking {
    sink: Sink,
    budget: Option<usize>,
}

impl Write for Choking {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self.budget {
            Some(0) => {
                self.budget = None;
                Err(io::Error::other("sink choked"))
            }
            Some(left) => {
                let n = data.len().min(left);
                self.budget = Some(left - n);
                self.sink.write(&data[..n])
            }
            None => self.sink.write(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reader over fixed bytes that counts closes.
struct Source {
    data: io::Cursor<Vec<u8>>,
    closes: Rc<RefCell<usize>>,
}

impl Read for Source {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.data.read(out)
    }
}

impl Close for Source {
    fn close(&mut self) -> io::Result<()> {
        *self.closes.borrow_mut() += 1;
        Ok(())
    }
}

#[test]
fn on_close_policy_batches_writes() {
    let sink = Sink::default();
    let mut writer = BufferedWriter::with_capacity(sink.clone(), 16, FlushPolicy::OnClose).unwrap();

    for _ in 0..3 {
        writer.write_all(b"ab").unwrap();
    }
    assert_eq!(sink.writes(), 0);
    assert_eq!(writer.buffered(), 6);

    writer.flush().unwrap();
    assert_eq!(sink.writes(), 1);
    assert_eq!(sink.data(), b"ababab");
}

#[test]
fn every_write_policy_flushes_each_call() {
    let sink = Sink::default();
    let mut writer =
        BufferedWriter::with_capacity(sink.clone(), 16, FlushPolicy::EveryWrite).unwrap();

    for _ in 0..3 {
        writer.write_all(b"ab").unwrap();
    }
    assert_eq!(sink.writes(), 3);
    assert_eq!(writer.buffered(), 0);
}

#[test]
fn full_buffer_spills_before_staging() {
    let sink = Sink::default();
    let mut writer = BufferedWriter::with_capacity(sink.clone(), 4, FlushPolicy::OnClose).unwrap();

    writer.write_all(b"abc").unwrap();
    writer.write_all(b"de").unwrap();
    assert_eq!(sink.data(), b"abc");

    writer.close().unwrap();
    assert_eq!(sink.data(), b"abcde");
    assert_eq!(sink.closes(), 1);
}

#[test]
fn large_write_bypasses_buffer() {
    let sink = Sink::default();
    let mut writer = BufferedWriter::with_capacity(sink.clone(), 4, FlushPolicy::OnClose).unwrap();

    writer.write_all(b"0123456789").unwrap();
    assert_eq!(sink.writes(), 1);
    assert_eq!(writer.buffered(), 0);
}

#[test]
fn nested_writers_close_inner_once() {
    let sink = Sink::default();
    let inner = BufferedWriter::with_capacity(sink.clone(), 8, FlushPolicy::OnClose).unwrap();
    let mut outer = BufferedWriter::with_capacity(inner, 8, FlushPolicy::OnClose).unwrap();

    outer.write_all(b"layered").unwrap();
    Close::close(&mut outer).unwrap();
    Close::close(&mut outer).unwrap();
    drop(outer);

    assert_eq!(sink.data(), b"layered");
    assert_eq!(sink.closes(), 1);
}

#[test]
fn failed_flush_keeps_only_unwritten_bytes() {
    let sink = Sink::default();
    let choking = Choking {
        sink: sink.clone(),
        budget: Some(3),
    };
    let mut writer = BufferedWriter::with_capacity(choking, 16, FlushPolicy::OnClose).unwrap();
    writer.write_all(b"abcdefgh").unwrap();

    assert!(writer.flush().is_err());
    assert_eq!(sink.data(), b"abc");
    assert_eq!(writer.buffered(), 5);

    writer.write_all(b"ij").unwrap();
    writer.flush().unwrap();
    assert_eq!(sink.data(), b"abcdefghij");
    assert_eq!(writer.buffered(), 0);
}

#[test]
fn closed_writer_rejects_writes() {
    let mut writer = BufferedWriter::new(Sink::default()).unwrap();
    Close::close(&mut writer).unwrap();

    let err = writer.write(b"late").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    assert!(writer.get_ref().is_none());
}

#[test]
fn drop_flushes_without_closing() {
    let sink = Sink::default();
    {
        let mut writer = BufferedWriter::new(sink.clone()).unwrap();
        writer.write_all(b"pending").unwrap();
    }
    assert_eq!(sink.data(), b"pending");
    assert_eq!(sink.closes(), 0);
}

#[test]
fn into_inner_flushes_and_returns_writer() {
    let sink = Sink::default();
    let mut writer = BufferedWriter::new(sink.clone()).unwrap();
    writer.write_all(b"kept").unwrap();

    let inner = writer.into_inner().unwrap();
    assert_eq!(inner.data(), b"kept");
    assert_eq!(sink.closes(), 0);
}

#[test]
fn writer_over_channel_releases_channel() {
    let backend = memory_with(b"");
    let (_src, dst) = memory_pair(&backend);
    assert_eq!(backend.open_handles(), 2);

    let mut writer = BufferedWriter::new(dst).unwrap();
    writer.write_all(b"through the decorator").unwrap();
    writer.close().unwrap();

    assert_eq!(backend.open_handles(), 1);
    assert_eq!(
        backend.contents("dst").unwrap(),
        Bytes::from_static(b"through the decorator")
    );
}

#[test]
fn reader_refills_small_buffer() {
    let closes = Rc::new(RefCell::new(0));
    let source = Source {
        data: io::Cursor::new(b"line one\nline two\n".to_vec()),
        closes: Rc::clone(&closes),
    };
    let mut reader = BufferedReader::with_capacity(source, 4).unwrap();

    let mut first = String::new();
    reader.read_line(&mut first).unwrap();
    assert_eq!(first, "line one\n");

    let rest: Vec<String> = (&mut reader).lines().map(|l| l.unwrap()).collect();
    assert_eq!(rest, vec!["line two".to_string()]);

    reader.close().unwrap();
    assert_eq!(*closes.borrow(), 1);
}

#[test]
fn reader_rejects_zero_capacity() {
    let err = BufferedReader::with_capacity(&b"hello\n"[..], 0).unwrap_err();
    assert!(matches!(err, ChannelError::InvalidArgument(_)));

    let mut reader = BufferedReader::with_capacity(&b"hello\n"[..], 1).unwrap();
    let mut line = String::new();
    assert_eq!(reader.read_line(&mut line).unwrap(), 6);
    assert_eq!(line, "hello\n");
}

#[test]
fn reader_over_channel_reads_everything() {
    let data = pattern(3000);
    let backend = memory_with(&data);
    let (src, _dst) = memory_pair(&backend);

    let mut reader = BufferedReader::with_capacity(src, 256).unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, data);

    reader.close().unwrap();
    assert_eq!(backend.open_handles(), 1);
}

#[test]
fn copy_stream_uses_caller_chunk() {
    let data = pattern(1000);
    let sink = Sink::default();
    let mut writer = sink.clone();

    assert_eq!(copy_stream(&mut data.as_slice(), &mut writer, 300).unwrap(), 1000);
    assert_eq!(sink.writes(), 4);
    assert_eq!(sink.data(), data);
}

#[test]
fn copy_stream_rejects_zero_chunk() {
    let err = copy_stream(&mut &b"x"[..], &mut Vec::<u8>::new(), 0).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    #[test]
    fn engine_reproduces_any_payload(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        sizes in proptest::collection::vec(1usize..300, 1..4),
    ) {
        let backend = memory_with(&data);
        let (mut src, mut dst) = memory_pair(&backend);

        let stats = TransferEngine::scatter(&sizes, false)
            .unwrap()
            .run(&mut src, &mut dst)
            .unwrap();

        prop_assert_eq!(stats.bytes, data.len() as u64);
        prop_assert_eq!(backend.contents("dst").unwrap(), Bytes::from(data));
    }

    #[test]
    fn buffered_writer_preserves_bytes(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..20),
        capacity in 1usize..128,
        every_write in any::<bool>(),
    ) {
        let sink = Sink::default();
        let policy = if every_write { FlushPolicy::EveryWrite } else { FlushPolicy::OnClose };
        let mut writer = BufferedWriter::with_capacity(sink.clone(), capacity, policy).unwrap();
        for chunk in &chunks {
            writer.write_all(chunk).unwrap();
        }
        writer.close().unwrap();

        prop_assert_eq!(sink.data(), chunks.concat());
        prop_assert_eq!(sink.closes(), 1);
    }
}
