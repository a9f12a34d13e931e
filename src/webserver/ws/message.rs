/// Outbound message envelope
///
/// Every message pushed to a streaming client has the same shape:
/// `{"type": "...", "timestamp": "...", "data": {...}}`.
/// Events are immutable once built; the hub fans out `Arc<Event>` so every
/// client sees the exact same value.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================================================
// EVENT TYPE
// ============================================================================

/// Event type tags understood by dashboard clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Aggregate job counters
    Status,
    /// Full job list, sent once at connect
    Jobs,
    /// Single job delta
    JobUpdate,
    ScheduleEvent,
    /// Dashboard metrics snapshot
    Metrics,
    Task,
    Event,
    Error,
}

impl EventType {
    /// Wire code (the `type` field of the envelope)
    pub fn code(&self) -> &'static str {
        match self {
            EventType::Status => "status",
            EventType::Jobs => "jobs",
            EventType::JobUpdate => "job_update",
            EventType::ScheduleEvent => "schedule_event",
            EventType::Metrics => "metrics",
            EventType::Task => "task",
            EventType::Event => "event",
            EventType::Error => "error",
        }
    }

    /// Parse a wire code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "status" => Some(EventType::Status),
            "jobs" => Some(EventType::Jobs),
            "job_update" => Some(EventType::JobUpdate),
            "schedule_event" => Some(EventType::ScheduleEvent),
            "metrics" => Some(EventType::Metrics),
            "task" => Some(EventType::Task),
            "event" => Some(EventType::Event),
            "error" => Some(EventType::Error),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// EVENT
// ============================================================================

/// Immutable event delivered to every registered client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: EventType,
    timestamp: DateTime<Utc>,
    data: Map<String, Value>,
}

impl Event {
    /// Create an event stamped with the current time
    ///
    /// Object payloads become the `data` map as-is. Any other JSON value is
    /// wrapped as `{"raw": value}`.
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self::at(event_type, Utc::now(), data)
    }

    /// Create an event with an explicit timestamp
    pub fn at(event_type: EventType, timestamp: DateTime<Utc>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("raw".to_string(), other);
                map
            }
        };
        Self {
            event_type,
            timestamp,
            data,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Serialize to JSON text
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
