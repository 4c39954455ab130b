//! Environment variable source: ITEMSYNC_* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// Uses ITEMSYNC prefix and __ as separator for nested keys,
/// e.g. `ITEMSYNC__ENRICHMENT__API_KEY`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix("ITEMSYNC")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}
