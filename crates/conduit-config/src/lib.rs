//! Configuration management for Conduit
//!
//! Settings are merged from several sources, highest precedence first:
//! 1. Environment variables (`CONDUIT_*` prefix, `__` between section and key)
//! 2. conduit.local.toml (untracked, local overrides)
//! 3. conduit.toml (project config)
//! 4. ~/.config/conduit/config.toml (user defaults)
//! 5. Built-in defaults
//!
//! ```toml
//! [buffer]
//! capacity = 1024
//! direct = false
//! scatter_sizes = [100, 1024]
//!
//! [transfer]
//! strategy = "auto"          # auto | buffered | scatter | mapped | direct
//! direct_threshold = 67108864
//! map_window = 67108864
//!
//! [stream]
//! buffer_size = 8192
//! flush = "on-close"         # on-close | every-write
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::{ConfigLoader, ENV_PREFIX};
pub use paths::{LOCAL_CONFIG_FILE, PROJECT_CONFIG_FILE, Paths};

const MIB: u64 = 1024 * 1024;

/// Main Conduit configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    pub buffer: BufferConfig,
    pub transfer: TransferConfig,
    pub stream: StreamConfig,
}

/// Staging buffers used by the buffered and scatter copy loops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
    /// Allocate off-heap instead of on the heap.
    pub direct: bool,
    pub scatter_sizes: Vec<usize>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            direct: false,
            scatter_sizes: vec![100, 1024],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub strategy: CopyStrategyKind,
    /// Sources at least this large take the direct path under `auto`.
    pub direct_threshold: u64,
    /// Bytes mapped at a time by the mapped strategy.
    pub map_window: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            strategy: CopyStrategyKind::Auto,
            direct_threshold: 64 * MIB,
            map_window: 64 * MIB as usize,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CopyStrategyKind {
    /// `direct` at or above `direct_threshold`, `buffered` below it.
    Auto,
    Buffered,
    Scatter,
    Mapped,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub buffer_size: usize,
    pub flush: FlushMode,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: 8192,
            flush: FlushMode::OnClose,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FlushMode {
    OnClose,
    EveryWrite,
}

impl ConduitConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parses a single TOML document; missing keys take their defaults.
    pub fn from_toml_str(source: &str, origin: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|source| ConfigError::Parse {
            path: origin.as_ref().to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads one TOML file without consulting any other source.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source, path)
    }

    /// Rejects settings no copy loop can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer.capacity == 0 {
            return Err(ConfigError::invalid("buffer.capacity", "must be non-zero"));
        }
        if self.buffer.scatter_sizes.is_empty() {
            return Err(ConfigError::invalid(
                "buffer.scatter_sizes",
                "needs at least one buffer",
            ));
        }
        if self.buffer.scatter_sizes.contains(&0) {
            return Err(ConfigError::invalid(
                "buffer.scatter_sizes",
                "every size must be non-zero",
            ));
        }
        if self.transfer.map_window == 0 {
            return Err(ConfigError::invalid("transfer.map_window", "must be non-zero"));
        }
        if self.stream.buffer_size == 0 {
            return Err(ConfigError::invalid("stream.buffer_size", "must be non-zero"));
        }
        Ok(())
    }
}
