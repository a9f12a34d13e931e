//! Structured logging for streamhub
//!
//! This module provides a small, ergonomic logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-subsystem debug control via --debug-<tag> flags
//! - Dual output: colored console + optional file persistence
//!
//! ## Usage
//!
//! ```rust
//! use streamhub::logger::{self, LogTag};
//!
//! logger::warning(LogTag::Hub, "Dispatch queue full, dropping event");
//! logger::info(LogTag::Webserver, "Listening on 127.0.0.1:8080");
//! logger::debug(LogTag::Client, "Client 7 registered"); // Only if --debug-client
//! ```
//!
//! ## Initialization
//!
//! Call once at startup, before any logging occurs:
//! ```rust,no_run
//! use streamhub::logger::{self, LoggerConfig};
//!
//! logger::init(LoggerConfig::default());
//! ```
//! Without `init` the default configuration (Info threshold, console only) applies.

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// Installs the configuration and opens the file sink when a path is set.
/// A file that cannot be opened downgrades to console-only output.
pub fn init(config: LoggerConfig) {
    let file_path = config.file_path.clone();
    set_logger_config(config);

    if let Some(path) = file_path {
        if let Err(e) = file::init_file_logging(&path) {
            warning(
                LogTag::System,
                &format!("File logging disabled, cannot open {}: {}", path.display(), e),
            );
        }
    }
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
///
/// Warnings are shown by default (unless --quiet is used).
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (detailed diagnostics)
///
/// Debug logs are ONLY shown when the --debug-<tag> flag for that tag is provided.
///
/// # Example
/// ```rust
/// use streamhub::logger::{self, LogTag};
///
/// // Only shown with --debug-hub
/// logger::debug(LogTag::Hub, "broadcast job_update (delivered=3, slow=0)");
/// ```
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (very detailed tracing, requires --verbose)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Force flush all pending log writes
///
/// Call this during shutdown to ensure all logs are written to disk.
pub fn flush() {
    file::flush_file_logging();
}
