//! Facts about what happened on the forecasting board.
//!
//! Every variant is append-only: nothing is ever updated in place. A revised
//! forecast is a second `PredictionSubmitted`, a resolution is a
//! `QuestionResolved` layered over the `QuestionPublished` it refers to.
//! Events serialize to `serde_json::Value` for the generic event store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Category, Outcome, UserDisplay};

/// The `type` tag becomes the `event_type` column in the events table.
/// The rest serializes to the `payload` JSONB column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // -----------------------------------------------------------------------
    // Questions
    // -----------------------------------------------------------------------
    QuestionPublished {
        question_id: Uuid,
        title: String,
        description: String,
        resolution_criteria: String,
        category: Category,
        close_date: DateTime<Utc>,
        author_id: Option<Uuid>,
        published_at: DateTime<Utc>,
        /// Set when the question was promoted from a community suggestion.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_suggestion: Option<Uuid>,
    },

    QuestionResolved {
        question_id: Uuid,
        outcome: Outcome,
        resolved_by: Uuid,
        resolved_at: DateTime<Utc>,
    },

    // -----------------------------------------------------------------------
    // Predictions
    // -----------------------------------------------------------------------
    PredictionSubmitted {
        prediction_id: Uuid,
        question_id: Uuid,
        user_id: Uuid,
        probability: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
        submitted_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_display: Option<UserDisplay>,
    },

    // -----------------------------------------------------------------------
    // Suggestions
    // -----------------------------------------------------------------------
    SuggestionSubmitted {
        suggestion_id: Uuid,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        category: Category,
        close_date: DateTime<Utc>,
        suggested_by: Uuid,
        submitted_at: DateTime<Utc>,
    },

    SuggestionReviewed {
        suggestion_id: Uuid,
        approved: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        admin_note: Option<String>,
        reviewed_by: Uuid,
        reviewed_at: DateTime<Utc>,
    },
}

impl Event {
    /// The event type string stored in the `event_type` column.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::QuestionPublished { .. } => "question_published",
            Event::QuestionResolved { .. } => "question_resolved",
            Event::PredictionSubmitted { .. } => "prediction_submitted",
            Event::SuggestionSubmitted { .. } => "suggestion_submitted",
            Event::SuggestionReviewed { .. } => "suggestion_reviewed",
        }
    }

    /// The aggregate this fact belongs to: the question for question and
    /// prediction facts, the suggestion for suggestion facts.
    pub fn stream_id(&self) -> Uuid {
        match self {
            Event::QuestionPublished { question_id, .. }
            | Event::QuestionResolved { question_id, .. }
            | Event::PredictionSubmitted { question_id, .. } => *question_id,
            Event::SuggestionSubmitted { suggestion_id, .. }
            | Event::SuggestionReviewed { suggestion_id, .. } => *suggestion_id,
        }
    }

    /// The user who caused this fact, if any.
    pub fn actor(&self) -> Option<Uuid> {
        match self {
            Event::QuestionPublished { author_id, .. } => *author_id,
            Event::QuestionResolved { resolved_by, .. } => Some(*resolved_by),
            Event::PredictionSubmitted { user_id, .. } => Some(*user_id),
            Event::SuggestionSubmitted { suggested_by, .. } => Some(*suggested_by),
            Event::SuggestionReviewed { reviewed_by, .. } => Some(*reviewed_by),
        }
    }

    /// Serialize this event to a JSON Value for the EventStore payload.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("Event serialization should never fail")
    }

    /// Deserialize an event from a JSON payload.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }
}
