/// Real-time event broadcast subsystem
///
/// Pushes job, schedule and metrics events to any number of long-lived
/// WebSocket clients.
///
/// ## Architecture
/// - One `WsHub` per process, passed explicitly to whoever needs it
/// - One bounded outbound queue per client; a full queue disconnects it
/// - Two tasks per client (reader for liveness, writer for all output)
/// - One cancellation signal shared by the hub, producers and clients
///
/// ## Key Components
/// - `hub`: registry, dispatch loop, backpressure and shutdown
/// - `connection`: per-client reader/writer tasks and cleanup guard
/// - `message`: outbound event envelope
/// - `admission`: credential and origin checks before the upgrade
/// - `producers`: connect snapshot, publish helpers, periodic metrics
/// - `health`: timing configuration and client liveness state
/// - `metrics`: hub and connection counters
/// - `signal`: one-shot cancellation latch
/// - `tasks`: panic-contained task spawning
pub mod admission;
pub mod connection;
pub mod health;
pub mod hub;
pub mod message;
pub mod metrics;
pub mod producers;
pub mod signal;
pub mod tasks;

pub use hub::{ClientId, HubState, RemovalReason, WsHub};
pub use message::{Event, EventType};
pub use signal::Signal;
