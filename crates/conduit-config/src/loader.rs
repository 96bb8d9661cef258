//! Configuration loader with multi-source merging

use crate::{ConduitConfig, Paths};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "CONDUIT";

/// Builds a [`ConduitConfig`] from every source, later sources winning:
///
/// 1. built-in defaults
/// 2. `~/.config/conduit/config.toml`
/// 3. `conduit.toml` in the project directory
/// 4. `conduit.local.toml` in the project directory
/// 5. `CONDUIT_*` environment variables
///
/// Environment keys use `__` between section and field, so
/// `CONDUIT_TRANSFER__DIRECT_THRESHOLD=1048576` sets
/// `transfer.direct_threshold`. `CONDUIT_BUFFER__SCATTER_SIZES` takes a
/// comma-separated list.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
    env_vars: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: ENV_PREFIX.to_string(),
            user_config: true,
            env_vars: None,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skips `~/.config/conduit/config.toml`.
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Reads environment overrides from `vars` instead of the process
    /// environment.
    pub fn with_env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    /// Merges every source and validates the result.
    pub fn load(self) -> Result<ConduitConfig> {
        let defaults = ConduitConfig::default();
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&defaults)?);

        if self.user_config
            && let Ok(user_config_file) = Paths::new().user_config_file()
        {
            builder = builder.add_source(toml_file(user_config_file));
        }

        builder = builder
            .add_source(toml_file(Paths::project_config_file(&self.project_dir)))
            .add_source(toml_file(Paths::local_config_file(&self.project_dir)));

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("buffer.scatter_sizes")
                .try_parsing(true)
                .source(self.env_vars),
        );

        let merged = builder.build().context("Failed to build configuration")?;
        let config: ConduitConfig = merged
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), falling back to defaults on any error.
    pub fn load_or_default(self) -> ConduitConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn toml_file(path: PathBuf) -> config::File<config::FileSourceFile, config::FileFormat> {
    config::File::from(path)
        .required(false)
        .format(config::FileFormat::Toml)
}
