//! EventPersister and EventSource implementations.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use futurykon_events::{AppendEvent, EventStore, StoredEvent};
use uuid::Uuid;

use crate::traits::{EventPersister, EventSource};

fn append_event(
    event_type: String,
    stream_id: Option<Uuid>,
    payload: serde_json::Value,
    actor: Option<Uuid>,
) -> AppendEvent {
    let mut append = AppendEvent::new(event_type, payload);
    if let Some(stream_id) = stream_id {
        append = append.with_stream(stream_id);
    }
    if let Some(actor) = actor {
        append = append.with_actor(actor);
    }
    append
}

// ---------------------------------------------------------------------------
// EventStore adapter (postgres)
// ---------------------------------------------------------------------------

#[async_trait]
impl EventPersister for EventStore {
    async fn persist(
        &self,
        event_type: String,
        stream_id: Option<Uuid>,
        payload: serde_json::Value,
        actor: Option<Uuid>,
    ) -> Result<StoredEvent> {
        self.append_and_read(append_event(event_type, stream_id, payload, actor))
            .await
    }

    async fn persist_child(
        &self,
        parent_seq: i64,
        event_type: String,
        stream_id: Option<Uuid>,
        payload: serde_json::Value,
        actor: Option<Uuid>,
    ) -> Result<StoredEvent> {
        self.append_child_and_read(parent_seq, append_event(event_type, stream_id, payload, actor))
            .await
    }
}

#[async_trait]
impl EventSource for EventStore {
    async fn read_from(&self, seq_start: i64, limit: usize) -> Result<Vec<StoredEvent>> {
        EventStore::read_from(self, seq_start, limit).await
    }

    async fn latest_seq(&self) -> Result<i64> {
        EventStore::latest_seq(self).await
    }

    async fn peek_from(&self, seq: i64) -> Result<Option<StoredEvent>> {
        EventStore::peek_from(self, seq).await
    }
}

// ---------------------------------------------------------------------------
// MemoryEventSink (no database required)
// ---------------------------------------------------------------------------

/// In-memory event log for testing. Assigns incrementing sequence numbers
/// and serves them back through `EventSource`. Thread-safe.
pub struct MemoryEventSink {
    next_seq: AtomicI64,
    events: Mutex<Vec<StoredEvent>>,
}

impl Default for MemoryEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self {
            next_seq: AtomicI64::new(1),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Read all persisted events (for test assertions).
    pub fn events(&self) -> Vec<StoredEvent> {
        self.events.lock().unwrap().clone()
    }

    fn make_stored(
        &self,
        event_type: String,
        stream_id: Option<Uuid>,
        payload: serde_json::Value,
        actor: Option<Uuid>,
        parent_seq: Option<i64>,
    ) -> StoredEvent {
        let mut events = self.events.lock().unwrap();
        let caused_by_seq = parent_seq.map(|parent| {
            events
                .iter()
                .find(|e| e.seq == parent)
                .and_then(|e| e.caused_by_seq)
                .unwrap_or(parent)
        });
        let stored = StoredEvent {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            ts: Utc::now(),
            event_type,
            stream_id,
            parent_seq,
            caused_by_seq,
            actor,
            payload,
            schema_v: 1,
        };
        events.push(stored.clone());
        stored
    }
}

#[async_trait]
impl EventPersister for MemoryEventSink {
    async fn persist(
        &self,
        event_type: String,
        stream_id: Option<Uuid>,
        payload: serde_json::Value,
        actor: Option<Uuid>,
    ) -> Result<StoredEvent> {
        Ok(self.make_stored(event_type, stream_id, payload, actor, None))
    }

    async fn persist_child(
        &self,
        parent_seq: i64,
        event_type: String,
        stream_id: Option<Uuid>,
        payload: serde_json::Value,
        actor: Option<Uuid>,
    ) -> Result<StoredEvent> {
        Ok(self.make_stored(event_type, stream_id, payload, actor, Some(parent_seq)))
    }
}

#[async_trait]
impl EventSource for MemoryEventSink {
    async fn read_from(&self, seq_start: i64, limit: usize) -> Result<Vec<StoredEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.seq >= seq_start)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_seq(&self) -> Result<i64> {
        Ok(self.events.lock().unwrap().last().map_or(0, |e| e.seq))
    }

    async fn peek_from(&self, seq: i64) -> Result<Option<StoredEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.seq >= seq)
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// Arc<P> blankets so the service and board share one log
// ---------------------------------------------------------------------------

#[async_trait]
impl<P: EventPersister + ?Sized> EventPersister for Arc<P> {
    async fn persist(
        &self,
        event_type: String,
        stream_id: Option<Uuid>,
        payload: serde_json::Value,
        actor: Option<Uuid>,
    ) -> Result<StoredEvent> {
        (**self).persist(event_type, stream_id, payload, actor).await
    }

    async fn persist_child(
        &self,
        parent_seq: i64,
        event_type: String,
        stream_id: Option<Uuid>,
        payload: serde_json::Value,
        actor: Option<Uuid>,
    ) -> Result<StoredEvent> {
        (**self)
            .persist_child(parent_seq, event_type, stream_id, payload, actor)
            .await
    }
}

#[async_trait]
impl<S: EventSource + ?Sized> EventSource for Arc<S> {
    async fn read_from(&self, seq_start: i64, limit: usize) -> Result<Vec<StoredEvent>> {
        (**self).read_from(seq_start, limit).await
    }

    async fn latest_seq(&self) -> Result<i64> {
        (**self).latest_seq().await
    }

    async fn peek_from(&self, seq: i64) -> Result<Option<StoredEvent>> {
        (**self).peek_from(seq).await
    }
}
