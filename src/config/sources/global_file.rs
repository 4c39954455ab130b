//! Global config file source: $XDG_CONFIG_HOME/itemsync/config.toml

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};

/// Add the global config file when it exists. A missing file or an
/// unresolvable home directory is not an error.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let Some(path) = xdg::global_config_file() else {
        return Ok(builder);
    };
    Ok(builder.add_source(File::from(path).required(false)))
}
