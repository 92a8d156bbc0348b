//! Core traits for the event engine.

use anyhow::Result;
use async_trait::async_trait;
use futurykon_common::Event;
use futurykon_events::StoredEvent;
use uuid::Uuid;

/// Events carry a type string and know how to serialize for the event store.
pub trait EventLike: Clone + Send + Sync + 'static {
    /// The event type string stored in the `event_type` column.
    fn event_type_str(&self) -> String;

    /// The stream (aggregate) this fact is filed under.
    fn stream(&self) -> Option<Uuid>;

    /// Who caused the fact, if anyone.
    fn actor_id(&self) -> Option<Uuid>;

    /// Serialize this event to the JSON payload stored in the event store.
    fn to_persist_payload(&self) -> serde_json::Value;
}

impl EventLike for Event {
    fn event_type_str(&self) -> String {
        self.event_type().to_string()
    }

    fn stream(&self) -> Option<Uuid> {
        Some(self.stream_id())
    }

    fn actor_id(&self) -> Option<Uuid> {
        self.actor()
    }

    fn to_persist_payload(&self) -> serde_json::Value {
        self.to_payload()
    }
}

/// Pure state updates. No I/O, no side effects.
///
/// Receives the persisted `StoredEvent` alongside the decoded event so that
/// state can carry store-assigned ordering (`seq`).
pub trait Reducer<E: EventLike, S: Send>: Send + Sync {
    fn reduce(&self, state: &mut S, event: &E, stored: &StoredEvent);
}

/// Persists events and returns a StoredEvent with sequence numbers.
///
/// Implemented by EventStore (postgres) and MemoryEventSink (tests).
/// Also implemented for `Arc<P>` so the sink can be shared for assertions.
#[async_trait]
pub trait EventPersister: Send + Sync {
    /// Persist a root event (no parent). Never overwrites an earlier fact.
    async fn persist(
        &self,
        event_type: String,
        stream_id: Option<Uuid>,
        payload: serde_json::Value,
        actor: Option<Uuid>,
    ) -> Result<StoredEvent>;

    /// Persist a child event (causal chain from parent_seq).
    async fn persist_child(
        &self,
        parent_seq: i64,
        event_type: String,
        stream_id: Option<Uuid>,
        payload: serde_json::Value,
        actor: Option<Uuid>,
    ) -> Result<StoredEvent>;
}

/// Reads committed facts in sequence order.
///
/// Implementations must not skip over sequence numbers that are not yet
/// visible: a batch ends at the first gap.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn read_from(&self, seq_start: i64, limit: usize) -> Result<Vec<StoredEvent>>;

    /// Highest committed sequence number, 0 for an empty log.
    async fn latest_seq(&self) -> Result<i64>;

    /// First committed fact at or after `seq`, across gaps.
    async fn peek_from(&self, seq: i64) -> Result<Option<StoredEvent>>;
}
