//! Local config file source: pageload.toml in the working directory, or an explicit path.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::Path;

pub const LOCAL_CONFIG_FILE: &str = "pageload.toml";

/// Add `pageload.toml` from `dir` to builder if it exists.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    dir: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = dir.join(LOCAL_CONFIG_FILE);
    if path.exists() {
        Ok(builder.add_source(File::from(path).required(false)))
    } else {
        Ok(builder)
    }
}

/// Add an explicit config file; a missing file is reported by the caller.
pub fn add_file(builder: ConfigBuilder<DefaultState>, path: &Path) -> ConfigBuilder<DefaultState> {
    builder.add_source(File::from(path).required(true))
}
