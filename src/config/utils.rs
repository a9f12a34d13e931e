/// Configuration utilities - loading and validation
use std::path::Path;

use super::schemas::Config;
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Load configuration from a specific file path
///
/// A missing file is not an error: the daemon starts with the defaults.
/// The loaded configuration is validated before it is returned.
pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        parse_config(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

/// Parse a TOML document into a configuration (no validation)
pub fn parse_config(contents: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(contents)
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Check invariants the runtime relies on
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if !config.server.ws_path.starts_with('/') {
        return Err(invalid("server.ws_path", "must start with '/'"));
    }
    if config.hub.dispatch_queue_capacity == 0 {
        return Err(invalid("hub.dispatch_queue_capacity", "must be greater than 0"));
    }

    let conn = &config.connection;
    if conn.queue_capacity == 0 {
        return Err(invalid("connection.queue_capacity", "must be greater than 0"));
    }
    if conn.heartbeat_interval_secs == 0 || conn.read_timeout_secs == 0 || conn.write_timeout_secs == 0 {
        return Err(invalid("connection", "intervals and timeouts must be greater than 0"));
    }
    if conn.heartbeat_interval_secs >= conn.read_timeout_secs {
        return Err(invalid(
            "connection.heartbeat_interval_secs",
            "must be shorter than read_timeout_secs",
        ));
    }

    if config.producers.snapshot_interval_secs == 0 {
        return Err(invalid("producers.snapshot_interval_secs", "must be greater than 0"));
    }

    if config.security.auth_enabled && config.security.api_key.is_empty() {
        return Err(invalid("security.api_key", "required when auth_enabled = true"));
    }

    Ok(())
}
