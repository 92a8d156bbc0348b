//! Event dispatch and the live forecasting board.
//!
//! Facts flow one way: a command is validated, persisted to the event log,
//! then reduced into the in-memory projection (`ForecastState`). Reads are
//! served from the projection; `ForecastBoard::refresh` catches it up with
//! facts written elsewhere.

pub mod board;
pub mod engine;
pub mod persist;
pub mod projection;
pub mod retry;
pub mod service;
pub mod traits;

pub use board::{BoardStatus, ForecastBoard, RefreshOutcome};
pub use engine::Engine;
pub use persist::MemoryEventSink;
pub use projection::{ForecastProjector, ForecastState};
pub use retry::RetryPolicy;
pub use service::{
    AdminError, ForecastService, NewQuestion, NewSuggestion, QuestionDetail, ServiceError,
    UserPredictions,
};
pub use traits::{EventLike, EventPersister, EventSource, Reducer};
