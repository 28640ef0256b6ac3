//! Engine configuration loader.
//!
//! Reads `greenlight.toml` from the data directory and deserializes it into
//! [`EngineConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::Path;

use greenlight_types::config::EngineConfig;

use crate::sqlite::pool::default_database_url;

/// Load engine configuration from `{data_dir}/greenlight.toml`.
///
/// - If the file does not exist, returns [`EngineConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join("greenlight.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No greenlight.toml found at {}, using defaults",
                config_path.display()
            );
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            EngineConfig::default()
        }
    }
}

/// Resolve the database URL for a loaded config.
///
/// Priority: explicit `database_url` in the config, then the
/// `GREENLIGHT_DB` environment variable, then the default location under
/// the data directory.
pub fn resolve_database_url(config: &EngineConfig) -> String {
    if let Some(url) = &config.database_url {
        return url.clone();
    }
    if let Ok(url) = std::env::var("GREENLIGHT_DB") {
        return url;
    }
    default_database_url()
}
