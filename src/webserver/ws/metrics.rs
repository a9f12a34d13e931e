use serde::Serialize;
/// Broadcast metrics
///
/// Hub-wide counters plus per-connection writer statistics.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// HUB METRICS
// ============================================================================

/// Hub-level metrics (aggregate across all clients, lifetime counters)
#[derive(Debug, Default)]
pub struct HubMetrics {
    clients_registered: AtomicU64,
    clients_removed: AtomicU64,
    registrations_rejected: AtomicU64,
    slow_client_disconnects: AtomicU64,
    events_accepted: AtomicU64,
    events_dropped: AtomicU64,
    deliveries: AtomicU64,
}

impl HubMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn client_registered(&self) {
        self.clients_registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Counted once per registry removal, i.e. once per queue close
    pub fn client_removed(&self) {
        self.clients_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn registration_rejected(&self) {
        self.registrations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn slow_client_disconnected(&self) {
        self.slow_client_disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Event accepted into the dispatch queue
    pub fn event_accepted(&self) {
        self.events_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Event dropped because the dispatch queue was full
    pub fn event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self, count: u64) {
        self.deliveries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HubMetricsSnapshot {
        HubMetricsSnapshot {
            clients_registered: self.clients_registered.load(Ordering::Relaxed),
            clients_removed: self.clients_removed.load(Ordering::Relaxed),
            registrations_rejected: self.registrations_rejected.load(Ordering::Relaxed),
            slow_client_disconnects: self.slow_client_disconnects.load(Ordering::Relaxed),
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
        }
    }
}

/// Hub metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubMetricsSnapshot {
    pub clients_registered: u64,
    pub clients_removed: u64,
    pub registrations_rejected: u64,
    pub slow_client_disconnects: u64,
    pub events_accepted: u64,
    pub events_dropped: u64,
    pub deliveries: u64,
}

// ============================================================================
// CONNECTION METRICS
// ============================================================================

/// Writer-side statistics for one connection (owned by the writer task)
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ConnectionMetrics {
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub pings_sent: u64,
    pub serialization_errors: u64,
}

impl ConnectionMetrics {
    pub fn record_message(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_ping(&mut self) {
        self.pings_sent += 1;
    }

    pub fn record_serialization_error(&mut self) {
        self.serialization_errors += 1;
    }
}
