//! Gate on what becomes a prediction event.
//!
//! Checked before the submission form is offered (`can_submit`) and again at
//! the persistence boundary (`validate_submission`); the second check is the
//! one that counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use futurykon_common::{Identity, Question, UserDisplay};

/// A validated submission, ready to be appended to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionDraft {
    pub question_id: Uuid,
    pub user_id: Uuid,
    /// Canonical whole percent in [0, 100].
    pub probability: f64,
    pub reasoning: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub user_display: Option<UserDisplay>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    #[error("you must be signed in to submit a prediction")]
    Unauthenticated,

    #[error("a probability between 0 and 100 is required")]
    MissingProbability,

    #[error("question closed for predictions at {close_date}")]
    QuestionClosed { close_date: DateTime<Utc> },
}

/// Canonical precision: clamp into [0, 100] and round to a whole percent
/// (halves away from zero). Non-finite input has no canonical form.
pub fn canonical_probability(raw: f64) -> Option<f64> {
    if !raw.is_finite() {
        return None;
    }
    Some(raw.clamp(0.0, 100.0).round())
}

/// Whether `identity` may open the submission form for `question` at `now`.
/// Returns the submitting user's id.
pub fn can_submit(
    identity: &Identity,
    question: &Question,
    now: DateTime<Utc>,
) -> Result<Uuid, SubmissionError> {
    let user_id = identity.user_id.ok_or(SubmissionError::Unauthenticated)?;
    if question.is_closed(now) {
        return Err(SubmissionError::QuestionClosed {
            close_date: question.close_date,
        });
    }
    Ok(user_id)
}

/// Validate a submission. On success nothing has been written yet; the
/// caller appends the draft.
pub fn validate_submission(
    identity: &Identity,
    question: &Question,
    probability: Option<f64>,
    reasoning: Option<&str>,
    now: DateTime<Utc>,
) -> Result<PredictionDraft, SubmissionError> {
    let user_id = can_submit(identity, question, now)?;

    let probability = probability
        .and_then(canonical_probability)
        .ok_or(SubmissionError::MissingProbability)?;

    let reasoning = reasoning
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Ok(PredictionDraft {
        question_id: question.id,
        user_id,
        probability,
        reasoning,
        submitted_at: now,
        user_display: identity.display.clone(),
    })
}
