/// Logger configuration, shared process-wide
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::RwLock;

use super::levels::LogLevel;
use super::tags::LogTag;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Messages above this level are suppressed
    pub min_level: LogLevel,

    /// Tags with debug output enabled (debug keys, e.g. "hub")
    pub debug_tags: HashSet<String>,

    /// Optional append-only log file
    pub file_path: Option<PathBuf>,

    /// Console colors (disabled for tests and piped output)
    pub colored: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            file_path: None,
            colored: true,
        }
    }
}

impl LoggerConfig {
    /// Enable debug output for a tag
    pub fn with_debug(mut self, tag: LogTag) -> Self {
        self.debug_tags.insert(tag.to_debug_key());
        if self.min_level < LogLevel::Debug {
            self.min_level = LogLevel::Debug;
        }
        self
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Replace the active logger configuration
pub fn set_logger_config(config: LoggerConfig) {
    match LOGGER_CONFIG.write() {
        Ok(mut current) => *current = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

/// Snapshot of the active logger configuration
pub fn get_logger_config() -> LoggerConfig {
    match LOGGER_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub(super) fn is_debug_enabled_for_tag(config: &LoggerConfig, tag: &LogTag) -> bool {
    config.debug_tags.contains(&tag.to_debug_key())
}
