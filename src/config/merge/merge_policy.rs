//! Merge rules: defaults, override order, conflict handling.

use crate::config::default_store_path;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override earlier ones key by key.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default(
            "storage.path",
            default_store_path().to_string_lossy().into_owned(),
        )?
        .set_default("pipeline.max_iterations", 32)?
        .set_default("pipeline.max_batch_size", 500)?
        .set_default("pipeline.concurrent_kinds", true)?
        .set_default("pipeline.exclude_comments_in_listings", true)
}
