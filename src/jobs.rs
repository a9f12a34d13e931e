/// In-memory job status board
///
/// Keeps the latest record per job id. It is the status source for the
/// connect snapshot and the metrics producer, and a discrete producer:
/// every upsert publishes a `job_update` event.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::logger::{self, LogTag};
use crate::webserver::ws::hub::WsHub;
use crate::webserver::ws::producers::{publish_job_update, JobCounters, StatusSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub name: String,
    pub status: JobStatus,
    /// Percent complete, 0-100
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied by `JobBoard::apply` (also the PUT body)
#[derive(Debug, Clone, Deserialize)]
pub struct JobUpdate {
    #[serde(default)]
    pub name: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct JobBoard {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl JobBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create or update a record and return the stored value
    pub fn apply(&self, id: &str, update: JobUpdate) -> JobRecord {
        let now = Utc::now();
        let mut jobs = self.jobs.write();

        let record = jobs.entry(id.to_string()).or_insert_with(|| JobRecord {
            id: id.to_string(),
            name: id.to_string(),
            status: JobStatus::Pending,
            progress: 0,
            error: None,
            created_at: now,
            updated_at: now,
        });

        if let Some(name) = update.name {
            record.name = name;
        }
        record.status = update.status;
        if let Some(progress) = update.progress {
            record.progress = progress.min(100);
        }
        if update.status == JobStatus::Completed {
            record.progress = 100;
        }
        record.error = update.error;
        record.updated_at = now;

        record.clone()
    }

    /// Apply an update and publish it as a `job_update` event
    pub fn upsert(&self, hub: &WsHub, id: &str, update: JobUpdate) -> JobRecord {
        let record = self.apply(id, update);
        let published = publish_job_update(hub, &record);

        logger::debug(
            LogTag::Jobs,
            &format!(
                "Job {} -> {:?} ({}%), published={}",
                record.id, record.status, record.progress, published
            ),
        );
        record
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.jobs.read().get(id).cloned()
    }

    /// All records, oldest first
    pub fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub fn counters(&self) -> JobCounters {
        let jobs = self.jobs.read();
        let mut counters = JobCounters {
            total_jobs: jobs.len(),
            ..Default::default()
        };
        for job in jobs.values() {
            match job.status {
                JobStatus::Running => counters.running_jobs += 1,
                JobStatus::Completed => counters.completed_jobs += 1,
                JobStatus::Failed => counters.failed_jobs += 1,
                JobStatus::Cancelled => counters.cancelled_jobs += 1,
                JobStatus::Pending => {}
            }
        }
        counters
    }
}

impl StatusSource for JobBoard {
    fn job_counters(&self) -> JobCounters {
        self.counters()
    }

    fn jobs(&self) -> Vec<Value> {
        self.list()
            .iter()
            .filter_map(|job| serde_json::to_value(job).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ws::health::LivenessCell;
    use crate::webserver::ws::hub::ClientRegistration;
    use crate::webserver::ws::message::EventType;
    use crate::webserver::ws::signal::Signal;
    use tokio::sync::mpsc;

    fn update(status: JobStatus, progress: Option<u8>) -> JobUpdate {
        JobUpdate {
            name: None,
            status,
            progress,
            error: None,
        }
    }

    #[test]
    fn test_apply_creates_and_updates() {
        let board = JobBoard::new();

        let created = board.apply("job-1", update(JobStatus::Running, Some(30)));
        assert_eq!(created.name, "job-1");
        assert_eq!(created.progress, 30);

        let updated = board.apply(
            "job-1",
            JobUpdate {
                name: Some("export vm-42".to_string()),
                status: JobStatus::Failed,
                progress: Some(250),
                error: Some("disk full".to_string()),
            },
        );
        assert_eq!(updated.name, "export vm-42");
        assert_eq!(updated.progress, 100);
        assert_eq!(updated.error.as_deref(), Some("disk full"));
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(board.list().len(), 1);
    }

    #[test]
    fn test_counters() {
        let board = JobBoard::new();
        board.apply("a", update(JobStatus::Running, None));
        board.apply("b", update(JobStatus::Completed, None));
        board.apply("c", update(JobStatus::Failed, None));
        board.apply("d", update(JobStatus::Pending, None));
        board.apply("e", update(JobStatus::Cancelled, None));

        let counters = board.job_counters();
        assert_eq!(counters.total_jobs, 5);
        assert_eq!(counters.running_jobs, 1);
        assert_eq!(counters.completed_jobs, 1);
        assert_eq!(counters.failed_jobs, 1);
        assert_eq!(counters.cancelled_jobs, 1);
        assert_eq!(counters.pending_jobs(), 1);
        assert_eq!(board.get("b").unwrap().progress, 100);
    }

    #[tokio::test]
    async fn test_upsert_publishes_job_update() {
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

        let board = JobBoard::new();
        board.upsert(&hub, "job-7", update(JobStatus::Running, Some(10)));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), EventType::JobUpdate);
        assert_eq!(event.data()["id"], "job-7");
        assert_eq!(event.data()["status"], "running");
        assert_eq!(event.data()["progress"], 10);

        hub.shutdown();
    }
}
