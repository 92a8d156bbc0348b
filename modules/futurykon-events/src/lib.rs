//! Generic append-only event store.
//!
//! Stores opaque JSONB facts keyed by a stream id, with optional causal
//! structure (parent_seq, caused_by_seq). Nothing is ever updated or deleted:
//! a correction is a new fact. Knows nothing about questions or predictions.
//!
//! Consumers provide their own event types that serialize to `serde_json::Value`.

pub mod store;
pub mod types;

pub use store::EventStore;
pub use types::{AppendEvent, StoredEvent};
