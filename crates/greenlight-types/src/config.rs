//! Engine configuration types.
//!
//! `EngineConfig` represents the top-level `greenlight.toml` consumed by the
//! host process when wiring the engine up.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the approval engine.
///
/// All fields have sensible defaults; an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite database URL. `None` falls back to the `GREENLIGHT_DB`
    /// environment variable, then to `greenlight.db` in the working
    /// directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Buffered capacity of the broadcast notification bus. Slow
    /// subscribers that fall more than this many events behind start
    /// losing the oldest ones.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            event_capacity: default_event_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert!(config.database_url.is_none());
        assert_eq!(config.event_capacity, 1024);
    }

    #[test]
    fn test_engine_config_deserialize_empty_file() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.event_capacity, 1024);
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
database_url = "sqlite:///var/lib/greenlight/engine.db"
event_capacity = 256
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("sqlite:///var/lib/greenlight/engine.db")
        );
        assert_eq!(config.event_capacity, 256);
    }
}
