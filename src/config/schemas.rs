/// Configuration schemas - every section defined once with its defaults
use std::time::Duration;

use crate::config_struct;

// ============================================================================
// SERVER
// ============================================================================

config_struct! {
    /// HTTP listener configuration
    pub struct ServerConfig {
        /// Host/IP address to bind
        host: String = "127.0.0.1".to_string(),
        /// Port to bind
        port: u16 = 8080,
        /// Path of the websocket upgrade endpoint
        ws_path: String = "/ws".to_string(),
    }
}

// ============================================================================
// SECURITY
// ============================================================================

config_struct! {
    /// Admission policy for the upgrade endpoint and the /api routes
    pub struct SecurityConfig {
        /// Require an API key and enforce the origin allow-list
        auth_enabled: bool = false,
        /// Shared API key (X-API-Key header or api_key query parameter)
        api_key: String = String::new(),
        /// Allowed browser origins; "*.example.com" matches any subdomain
        allowed_origins: Vec<String> = Vec::new(),
    }
}

// ============================================================================
// HUB
// ============================================================================

config_struct! {
    /// Broadcast hub configuration
    pub struct HubConfig {
        /// Capacity of the hub's internal broadcast request queue.
        /// Broadcasts beyond this backlog are dropped with a warning.
        dispatch_queue_capacity: usize = 256,
    }
}

// ============================================================================
// CONNECTION
// ============================================================================

config_struct! {
    /// Per-client connection settings
    pub struct ConnectionConfig {
        /// Outbound queue capacity; a full queue disconnects the client
        queue_capacity: usize = 256,
        /// Interval between protocol-level pings
        heartbeat_interval_secs: u64 = 54,
        /// Peer is considered dead after this long without inbound traffic
        read_timeout_secs: u64 = 60,
        /// Deadline for a single outbound frame
        write_timeout_secs: u64 = 10,
    }
}

impl ConnectionConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

// ============================================================================
// PRODUCERS
// ============================================================================

config_struct! {
    /// Periodic producer configuration
    pub struct ProducersConfig {
        /// Interval of the dashboard metrics snapshot
        snapshot_interval_secs: u64 = 1,
    }
}

impl ProducersConfig {
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }
}

// ============================================================================
// LOGGING
// ============================================================================

config_struct! {
    /// Log output configuration
    pub struct LoggingConfig {
        /// Append-only log file (empty = console only)
        file: String = String::new(),
    }
}

// ============================================================================
// ROOT
// ============================================================================

config_struct! {
    /// Complete daemon configuration
    pub struct Config {
        server: ServerConfig = ServerConfig::default(),
        security: SecurityConfig = SecurityConfig::default(),
        hub: HubConfig = HubConfig::default(),
        connection: ConnectionConfig = ConnectionConfig::default(),
        producers: ProducersConfig = ProducersConfig::default(),
        logging: LoggingConfig = LoggingConfig::default(),
    }
}
