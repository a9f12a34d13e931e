/// Shared application state for the webserver
///
/// Holds the explicitly constructed hub and job board so every handler
/// reaches the same instances; nothing here is a process-wide global.
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::jobs::JobBoard;
use crate::webserver::ws::health::HealthConfig;
use crate::webserver::ws::WsHub;

/// Shared application state passed to all route handlers
#[derive(Clone)]
pub struct AppState {
    /// Daemon configuration
    pub config: Arc<Config>,

    /// Broadcast hub
    pub hub: Arc<WsHub>,

    /// Job status board (status source for snapshots)
    pub jobs: Arc<JobBoard>,

    /// Server startup time
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, hub: Arc<WsHub>, jobs: Arc<JobBoard>) -> Self {
        Self {
            config: Arc::new(config),
            hub,
            jobs,
            startup_time: Utc::now(),
        }
    }

    /// Per-connection settings for new clients
    pub fn health_config(&self) -> HealthConfig {
        HealthConfig::from_config(&self.config.connection)
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.startup_time).num_seconds().max(0) as u64
    }
}
