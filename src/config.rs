//! Configuration System
//!
//! Layered configuration for the load pipeline: built-in defaults, then the
//! global config file, then a local or explicit config file, then environment
//! variables prefixed with `PAGELOAD__`.

use crate::error::LoadError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageloadConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled database directory
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Store path under the platform data directory, or `.pageload/store`.
pub fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("org", "pageload", "pageload")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".pageload/store"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Pipeline driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Hard cap on fixpoint iterations per resolve call.
    ///
    /// Reference following advances one hop per iteration, so a prerequisite
    /// chain staged with the `requisite` preset needs about one iteration per
    /// page in the chain. With the default of 32, chains of more than about 30
    /// pages fail with `IterationCapExceeded`. Raise this for deeper curricula.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Maximum ids per store query
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Query pages, users and masteries of one iteration concurrently
    #[serde(default = "default_true")]
    pub concurrent_kinds: bool,

    /// Hide comment pages from listing queries
    #[serde(default = "default_true")]
    pub exclude_comments_in_listings: bool,
}

fn default_max_iterations() -> usize {
    32
}

fn default_max_batch_size() -> usize {
    500
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_batch_size: default_max_batch_size(),
            concurrent_kinds: default_true(),
            exclude_comments_in_listings: default_true(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_iterations == 0 {
            return Err("max_iterations must be at least 1".to_string());
        }
        if self.max_batch_size == 0 {
            return Err("max_batch_size must be at least 1".to_string());
        }
        Ok(())
    }
}

impl PageloadConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), LoadError> {
        let mut errors = Vec::new();
        if let Err(e) = self.pipeline.validate() {
            errors.push(format!("pipeline: {}", e));
        }
        if self.storage.path.as_os_str().is_empty() {
            errors.push("storage: path cannot be empty".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(LoadError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )))
        }
    }

    pub fn to_toml(&self) -> Result<String, LoadError> {
        toml::to_string_pretty(self)
            .map_err(|e| LoadError::ConfigError(format!("Failed to render config: {}", e)))
    }
}

/// Builds a `PageloadConfig` from every configured source
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from defaults, the global file, `pageload.toml` in `dir` and the environment.
    pub fn load(dir: &Path) -> Result<PageloadConfig, LoadError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::local_file::add_to_builder(builder, dir)?;
        let builder = sources::env::add_to_builder(builder);
        Self::finish(builder)
    }

    /// Load with an explicit config file that must exist.
    pub fn load_from_file(path: &Path) -> Result<PageloadConfig, LoadError> {
        if !path.exists() {
            return Err(LoadError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::local_file::add_file(builder, path);
        let builder = sources::env::add_to_builder(builder);
        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<PageloadConfig, LoadError> {
        let config: PageloadConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
