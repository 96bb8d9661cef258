//! Whole-file copies driven by configuration.

use std::path::Path;

use conduit_channel::{Channel, ChannelError, CopyStrategy};
use conduit_config::{ConduitConfig, CopyStrategyKind};
use conduit_io::OpenFlags;

use crate::Result;

/// Outcome of [`copy_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub bytes: u64,
    /// Strategy actually used; `auto` is resolved against the source size.
    pub strategy: CopyStrategy,
}

/// Resolves the configured strategy for a source of `size` bytes.
pub fn strategy_for(config: &ConduitConfig, size: u64) -> CopyStrategy {
    let buffer = &config.buffer;
    match config.transfer.strategy {
        CopyStrategyKind::Auto => CopyStrategy::auto(
            size,
            config.transfer.direct_threshold,
            buffer.capacity,
            buffer.direct,
        ),
        CopyStrategyKind::Buffered => CopyStrategy::Buffered {
            capacity: buffer.capacity,
            direct: buffer.direct,
        },
        CopyStrategyKind::Scatter => CopyStrategy::Scatter {
            sizes: buffer.scatter_sizes.clone(),
            direct: buffer.direct,
        },
        CopyStrategyKind::Mapped => CopyStrategy::Mapped {
            window: config.transfer.map_window,
        },
        CopyStrategyKind::Direct => CopyStrategy::Direct,
    }
}

/// Copies `src` to `dst`, creating or truncating `dst`.
///
/// Both channels are closed before returning, so a close failure on the
/// sink is reported rather than logged.
pub fn copy_file(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    config: &ConduitConfig,
) -> Result<CopyReport> {
    config.validate()?;
    let (src, dst) = (src.as_ref(), dst.as_ref());

    // Opening the sink truncates it, which would wipe the source first
    if let (Ok(a), Ok(b)) = (src.canonicalize(), dst.canonicalize())
        && a == b
    {
        return Err(ChannelError::InvalidArgument(format!(
            "source and destination are the same file: {}",
            a.display()
        ))
        .into());
    }

    let span = tracing::debug_span!("copy_file", src = %src.display(), dst = %dst.display());
    let _guard = span.enter();

    let mut source = Channel::open(src, OpenFlags::read_only())?;
    let strategy = strategy_for(config, source.size()?);
    let sink_flags = match strategy {
        CopyStrategy::Mapped { .. } => OpenFlags::read_write().with_create().with_truncate(),
        _ => OpenFlags::create_write(),
    };
    let mut sink = Channel::open(dst, sink_flags)?;

    let bytes = strategy.copy(&mut source, &mut sink)?;
    sink.close()?;
    source.close()?;

    tracing::debug!(bytes, ?strategy, "file copied");
    Ok(CopyReport { bytes, strategy })
}
