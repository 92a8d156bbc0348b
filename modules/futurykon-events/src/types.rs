//! Core types for the event store. Domain-agnostic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event as stored in Postgres. Returned by all read methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub seq: i64,
    pub ts: DateTime<Utc>,
    pub event_type: String,
    pub stream_id: Option<Uuid>,
    pub parent_seq: Option<i64>,
    pub caused_by_seq: Option<i64>,
    pub actor: Option<Uuid>,
    pub payload: serde_json::Value,
    pub schema_v: i16,
}

/// An event to be appended. The caller builds this; the store assigns seq/ts.
#[derive(Debug, Clone)]
pub struct AppendEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub stream_id: Option<Uuid>,
    pub actor: Option<Uuid>,
    pub schema_v: i16,
}

impl AppendEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            stream_id: None,
            actor: None,
            schema_v: 1,
        }
    }

    pub fn with_stream(mut self, stream_id: Uuid) -> Self {
        self.stream_id = Some(stream_id);
        self
    }

    pub fn with_actor(mut self, actor: Uuid) -> Self {
        self.actor = Some(actor);
        self
    }
}
