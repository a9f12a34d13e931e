/// Event producers
///
/// - Discrete producers: helpers that build an event for one state change
///   and hand it to `WsHub::broadcast` (fire-and-forget)
/// - Connect snapshot: `status` + `jobs`, enqueued for each new client
/// - `SnapshotProducer`: periodic dashboard metrics, computed only while at
///   least one client is connected
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};

use crate::logger::{self, LogTag};

use super::hub::WsHub;
use super::message::{Event, EventType};
use super::signal::Signal;
use super::tasks::spawn_supervised;

// ============================================================================
// STATUS SOURCE
// ============================================================================

/// Aggregate job counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounters {
    pub total_jobs: usize,
    pub running_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub cancelled_jobs: usize,
}

impl JobCounters {
    /// Jobs not yet running or finished
    pub fn pending_jobs(&self) -> usize {
        self.total_jobs
            .saturating_sub(self.running_jobs)
            .saturating_sub(self.completed_jobs)
            .saturating_sub(self.failed_jobs)
            .saturating_sub(self.cancelled_jobs)
    }
}

/// Read-only view of the job state that snapshots are built from
pub trait StatusSource: Send + Sync {
    fn job_counters(&self) -> JobCounters;

    /// Every known job as a JSON object
    fn jobs(&self) -> Vec<Value>;
}

// ============================================================================
// SNAPSHOT EVENTS
// ============================================================================

pub fn status_event(counters: &JobCounters) -> Event {
    Event::new(
        EventType::Status,
        json!({
            "total_jobs": counters.total_jobs,
            "running_jobs": counters.running_jobs,
            "completed_jobs": counters.completed_jobs,
            "failed_jobs": counters.failed_jobs,
        }),
    )
}

pub fn jobs_event(jobs: Vec<Value>) -> Event {
    Event::new(EventType::Jobs, json!({ "jobs": jobs }))
}

/// Events every client receives right after registration
pub fn connect_snapshot(source: &dyn StatusSource) -> Vec<Event> {
    vec![
        status_event(&source.job_counters()),
        jobs_event(source.jobs()),
    ]
}

/// Dashboard metrics payload
pub fn metrics_event(source: &dyn StatusSource, websocket_clients: usize, uptime: Duration) -> Event {
    let counters = source.job_counters();

    Event::new(
        EventType::Metrics,
        json!({
            "timestamp": Utc::now().to_rfc3339(),
            "jobs_active": counters.running_jobs,
            "jobs_completed": counters.completed_jobs,
            "jobs_failed": counters.failed_jobs,
            "jobs_pending": counters.pending_jobs(),
            "jobs_cancelled": counters.cancelled_jobs,
            "queue_length": counters.total_jobs,
            "websocket_clients": websocket_clients,
            "recent_jobs": source.jobs(),
            "system_health": "healthy",
            "alerts": [],
            "uptime_seconds": uptime.as_secs_f64(),
        }),
    )
}

// ============================================================================
// DISCRETE PRODUCERS
// ============================================================================

/// Publish a single job delta
pub fn publish_job_update<T: Serialize>(hub: &WsHub, job: &T) -> bool {
    match serde_json::to_value(job) {
        Ok(data) => hub.broadcast(Event::new(EventType::JobUpdate, data)),
        Err(e) => {
            logger::warning(
                LogTag::Producer,
                &format!("Failed to serialize job update: {}", e),
            );
            false
        }
    }
}

/// Publish a schedule event; `schedule_id` and `event` are merged into `data`
pub fn publish_schedule_event(
    hub: &WsHub,
    event: &str,
    schedule_id: &str,
    data: Option<Map<String, Value>>,
) -> bool {
    let mut data = data.unwrap_or_default();
    data.insert("schedule_id".to_string(), Value::String(schedule_id.to_string()));
    data.insert("event".to_string(), Value::String(event.to_string()));

    hub.broadcast(Event::new(EventType::ScheduleEvent, Value::Object(data)))
}

pub fn publish_task(hub: &WsHub, data: Value) -> bool {
    hub.broadcast(Event::new(EventType::Task, data))
}

pub fn publish_error(hub: &WsHub, message: &str, details: Option<Value>) -> bool {
    let mut data = Map::new();
    data.insert("message".to_string(), Value::String(message.to_string()));
    if let Some(details) = details {
        data.insert("details".to_string(), details);
    }
    hub.broadcast(Event::new(EventType::Error, Value::Object(data)))
}

// ============================================================================
// PERIODIC SNAPSHOT PRODUCER
// ============================================================================

/// Tick counters of the periodic producer
#[derive(Debug, Default)]
pub struct ProducerStats {
    ticks: AtomicU64,
    snapshots: AtomicU64,
    skipped: AtomicU64,
}

impl ProducerStats {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::Relaxed)
    }

    /// Ticks that found no clients and computed nothing
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

pub struct SnapshotProducer {
    hub: Arc<WsHub>,
    source: Arc<dyn StatusSource>,
    interval: Duration,
    started_at: Instant,
    stats: Arc<ProducerStats>,
}

impl SnapshotProducer {
    pub fn new(hub: Arc<WsHub>, source: Arc<dyn StatusSource>, interval: Duration) -> Self {
        Self {
            hub,
            source,
            interval: interval.max(Duration::from_millis(1)),
            started_at: Instant::now(),
            stats: Arc::new(ProducerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ProducerStats> {
        Arc::clone(&self.stats)
    }

    /// Spawn the producer loop; it exits when `shutdown` triggers
    pub fn start(self, shutdown: Signal) -> JoinHandle<Option<()>> {
        spawn_supervised("snapshot producer", self.run(shutdown))
    }

    async fn run(self, shutdown: Signal) {
        let mut ticker = interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        logger::debug(
            LogTag::Producer,
            &format!("Snapshot producer started (interval={:?})", self.interval),
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = ticker.tick() => self.tick(),
            }
        }

        logger::debug(
            LogTag::Producer,
            &format!(
                "Snapshot producer stopped (ticks={}, snapshots={}, skipped={})",
                self.stats.ticks(),
                self.stats.snapshots(),
                self.stats.skipped()
            ),
        );
    }

    fn tick(&self) {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        let clients = self.hub.client_count();
        if clients == 0 {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let event = metrics_event(self.source.as_ref(), clients, self.started_at.elapsed());
        if self.hub.broadcast(event) {
            self.stats.snapshots.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ws::health::LivenessCell;
    use crate::webserver::ws::hub::ClientRegistration;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    /// Source that counts every call made into it
    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    impl StatusSource for CountingSource {
        fn job_counters(&self) -> JobCounters {
            self.calls.fetch_add(1, Ordering::SeqCst);
            JobCounters {
                total_jobs: 5,
                running_jobs: 1,
                completed_jobs: 2,
                failed_jobs: 1,
                cancelled_jobs: 0,
            }
        }

        fn jobs(&self) -> Vec<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![json!({"id": "job-1"})]
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_computation_without_clients() {
        let hub = WsHub::with_capacity(16);
        hub.start().unwrap();
        let source = Arc::new(CountingSource::default());

        let producer = SnapshotProducer::new(
            Arc::clone(&hub),
            source.clone(),
            Duration::from_secs(1),
        );
        let stats = producer.stats();
        let shutdown = Signal::new();
        let handle = producer.start(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(10_500)).await;

        assert_eq!(stats.ticks(), 10);
        assert_eq!(stats.skipped(), 10);
        assert_eq!(stats.snapshots(), 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        shutdown.trigger();
        handle.await.unwrap();
        hub.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshots_with_client() {
        let hub = WsHub::with_capacity(16);
        hub.start().unwrap();
        let source = Arc::new(CountingSource::default());

        let (tx, mut rx) = mpsc::channel(16);
        hub.register(ClientRegistration {
            id: hub.next_client_id(),
            sender: tx,
            closer: Signal::new(),
            liveness: Arc::new(LivenessCell::new()),
            initial: Vec::new(),
        })
        .await
        .unwrap();

        let producer = SnapshotProducer::new(Arc::clone(&hub), source.clone(), Duration::from_secs(1));
        let stats = producer.stats();
        let handle = producer.start(hub.shutdown_signal());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), EventType::Metrics);
        let data = event.data();
        assert_eq!(data["websocket_clients"], json!(1));
        assert_eq!(data["jobs_active"], json!(1));
        assert_eq!(data["jobs_pending"], json!(1));
        assert_eq!(data["queue_length"], json!(5));
        assert_eq!(data["recent_jobs"][0]["id"], "job-1");
        assert!(data["uptime_seconds"].as_f64().unwrap() >= 0.0);
        assert!(stats.snapshots() >= 1);

        hub.shutdown();
        handle.await.unwrap();
    }

    #[test]
    fn test_connect_snapshot_order() {
        let source = CountingSource::default();
        let events = connect_snapshot(&source);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), EventType::Status);
        assert_eq!(events[0].data()["total_jobs"], json!(5));
        assert_eq!(events[0].data()["failed_jobs"], json!(1));
        assert_eq!(events[1].event_type(), EventType::Jobs);
        assert_eq!(events[1].data()["jobs"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_pending_never_underflows() {
        let counters = JobCounters {
            total_jobs: 1,
            running_jobs: 2,
            ..Default::default()
        };
        assert_eq!(counters.pending_jobs(), 0);
    }

    #[tokio::test]
    async fn test_discrete_publishers() {
        let hub = WsHub::with_capacity(16);
        hub.start().unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        hub.register(ClientRegistration {
            id: hub.next_client_id(),
            sender: tx,
            closer: Signal::new(),
            liveness: Arc::new(LivenessCell::new()),
            initial: Vec::new(),
        })
        .await
        .unwrap();

        let mut data = Map::new();
        data.insert("next_run".to_string(), json!("2026-01-01T00:00:00Z"));
        assert!(publish_schedule_event(&hub, "triggered", "sched-9", Some(data)));
        assert!(publish_error(&hub, "export failed", None));
        assert!(publish_task(&hub, json!("vacuum")));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), EventType::ScheduleEvent);
        assert_eq!(event.data()["schedule_id"], "sched-9");
        assert_eq!(event.data()["event"], "triggered");
        assert_eq!(event.data()["next_run"], "2026-01-01T00:00:00Z");

        let error = rx.recv().await.unwrap();
        assert_eq!(error.event_type(), EventType::Error);
        assert_eq!(error.data()["message"], "export failed");

        let task = rx.recv().await.unwrap();
        assert_eq!(task.event_type(), EventType::Task);
        assert_eq!(task.data()["raw"], "vacuum");

        hub.shutdown();
    }
}
