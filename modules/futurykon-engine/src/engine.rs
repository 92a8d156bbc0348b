//! The dispatch loop.

use std::marker::PhantomData;

use anyhow::Result;
use futurykon_events::StoredEvent;
use tracing::debug;

use crate::traits::{EventLike, EventPersister, Reducer};

/// Generic event dispatch engine.
///
/// Persist → reduce. A fact only reaches state after the store has accepted
/// it, so state never holds something the log does not.
pub struct Engine<E, S, Red, P>
where
    E: EventLike,
    S: Send,
    Red: Reducer<E, S>,
    P: EventPersister,
{
    reducer: Red,
    persister: P,
    _phantom: PhantomData<fn() -> (E, S)>,
}

impl<E, S, Red, P> Engine<E, S, Red, P>
where
    E: EventLike,
    S: Send,
    Red: Reducer<E, S>,
    P: EventPersister,
{
    pub fn new(reducer: Red, persister: P) -> Self {
        Self {
            reducer,
            persister,
            _phantom: PhantomData,
        }
    }

    /// Persist a root event and reduce it into `state`.
    pub async fn dispatch(&self, event: E, state: &mut S) -> Result<StoredEvent> {
        let stored = self
            .persister
            .persist(
                event.event_type_str(),
                event.stream(),
                event.to_persist_payload(),
                event.actor_id(),
            )
            .await?;
        self.apply(&event, &stored, state);
        Ok(stored)
    }

    /// Persist an event caused by `parent_seq` and reduce it into `state`.
    pub async fn dispatch_child(&self, parent_seq: i64, event: E, state: &mut S) -> Result<StoredEvent> {
        let stored = self
            .persister
            .persist_child(
                parent_seq,
                event.event_type_str(),
                event.stream(),
                event.to_persist_payload(),
                event.actor_id(),
            )
            .await?;
        self.apply(&event, &stored, state);
        Ok(stored)
    }

    fn apply(&self, event: &E, stored: &StoredEvent, state: &mut S) {
        debug!(seq = stored.seq, event_type = %stored.event_type, "dispatched");
        self.reducer.reduce(state, event, stored);
    }
}
