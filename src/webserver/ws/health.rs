/// Connection health: timing configuration, liveness state and activity tracking
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::ConnectionConfig;

use super::hub::RemovalReason;

/// Upper bound for the best-effort close frame sent on the way out
pub const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// HEALTH CONFIG
// ============================================================================

/// Per-connection timing and queue settings
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Interval between protocol-level pings (writer side)
    pub heartbeat_interval: Duration,

    /// Maximum silence from the peer before it is treated as dead (reader side)
    pub read_timeout: Duration,

    /// Deadline for a single outbound frame
    pub write_timeout: Duration,

    /// Outbound queue capacity
    pub queue_capacity: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default())
    }
}

impl HealthConfig {
    /// Create from config values
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            queue_capacity: config.queue_capacity.max(1),
        }
    }
}

// ============================================================================
// LIVENESS STATE
// ============================================================================

/// Lifecycle of one client: Connecting -> Registered -> Closing -> Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ClientLiveness {
    Connecting = 0,
    Registered = 1,
    Closing = 2,
    Closed = 3,
}

impl fmt::Display for ClientLiveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientLiveness::Connecting => "connecting",
            ClientLiveness::Registered => "registered",
            ClientLiveness::Closing => "closing",
            ClientLiveness::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Liveness shared by the hub and the connection; transitions only move forward
///
/// Also holds the first reason recorded for the client leaving, so a removal
/// decided by the hub reaches the writer's close frame.
#[derive(Debug)]
pub struct LivenessCell {
    state: AtomicU8,
    reason: Mutex<Option<RemovalReason>>,
}

impl LivenessCell {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ClientLiveness::Connecting as u8),
            reason: Mutex::new(None),
        }
    }

    pub fn get(&self) -> ClientLiveness {
        match self.state.load(Ordering::Acquire) {
            0 => ClientLiveness::Connecting,
            1 => ClientLiveness::Registered,
            2 => ClientLiveness::Closing,
            _ => ClientLiveness::Closed,
        }
    }

    /// Advance to `next` unless the cell is already at or past it
    pub fn advance(&self, next: ClientLiveness) {
        self.state.fetch_max(next as u8, Ordering::AcqRel);
    }

    /// Record why the client leaves and return the reason that stuck
    pub fn record_reason(&self, reason: RemovalReason) -> RemovalReason {
        *self.reason.lock().get_or_insert(reason)
    }

    pub fn reason(&self) -> Option<RemovalReason> {
        *self.reason.lock()
    }
}

impl Default for LivenessCell {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ACTIVITY TRACKER
// ============================================================================

/// Inbound activity tracker owned by the reader task
#[derive(Debug)]
pub struct ConnectionHealth {
    last_activity: Instant,
    inbound_frames: u64,
}

impl ConnectionHealth {
    pub fn new() -> Self {
        Self {
            last_activity: Instant::now(),
            inbound_frames: 0,
        }
    }

    /// Record any inbound frame (data, ping, pong)
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
        self.inbound_frames += 1;
    }

    pub fn seconds_since_activity(&self) -> u64 {
        self.last_activity.elapsed().as_secs()
    }

    pub fn inbound_frames(&self) -> u64 {
        self.inbound_frames
    }
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_only_moves_forward() {
        let cell = LivenessCell::new();
        assert_eq!(cell.get(), ClientLiveness::Connecting);

        cell.advance(ClientLiveness::Registered);
        cell.advance(ClientLiveness::Closed);
        cell.advance(ClientLiveness::Closing);
        assert_eq!(cell.get(), ClientLiveness::Closed);
    }

    #[test]
    fn test_first_removal_reason_sticks() {
        let cell = LivenessCell::new();
        assert_eq!(cell.reason(), None);

        assert_eq!(cell.record_reason(RemovalReason::SlowConsumer), RemovalReason::SlowConsumer);
        assert_eq!(cell.record_reason(RemovalReason::Closed), RemovalReason::SlowConsumer);
        assert_eq!(cell.reason(), Some(RemovalReason::SlowConsumer));
    }

    #[test]
    fn test_health_config_from_connection_config() {
        let health = HealthConfig::default();
        assert_eq!(health.heartbeat_interval, Duration::from_secs(54));
        assert_eq!(health.read_timeout, Duration::from_secs(60));
        assert_eq!(health.write_timeout, Duration::from_secs(10));
        assert!(health.heartbeat_interval < health.read_timeout);
    }

    #[test]
    fn test_activity_tracking() {
        let mut health = ConnectionHealth::new();
        health.record_activity();
        health.record_activity();
        assert_eq!(health.inbound_frames(), 2);
        assert_eq!(health.seconds_since_activity(), 0);
    }
}
