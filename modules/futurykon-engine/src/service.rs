//! Commands and queries over the board.
//!
//! Every command follows the same order: check identity and inputs against
//! the current projection, persist the fact, reduce it into the projection.
//! Nothing is written when a check fails. Queries are served from the
//! projection without touching the log.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futurykon_common::{
    Category, Event, Identity, Outcome, Prediction, Question, QuestionSuggestion, SuggestionStatus,
};
use futurykon_forecast::{
    chart_view, group_by_question, group_by_user, history_series, leaderboard, score_question,
    user_stats, validate_submission, CommunityPrediction, LeaderboardEntry,
    QuestionPredictionSummary, QuestionScore, SeriesView, SubmissionError, UserPredictionGroup,
    UserStats,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::board::{ForecastBoard, RefreshOutcome};
use crate::engine::Engine;
use crate::projection::{ForecastProjector, ForecastState};
use crate::traits::{EventPersister, EventSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("sign in required")]
    Unauthenticated,

    #[error("admin rights required")]
    NotAdmin,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error("question {0} not found")]
    QuestionNotFound(Uuid),

    #[error("suggestion {0} not found")]
    SuggestionNotFound(Uuid),

    #[error("question {0} is already resolved")]
    AlreadyResolved(Uuid),

    #[error("suggestion {0} was already reviewed")]
    AlreadyReviewed(Uuid),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Persist(#[from] anyhow::Error),
}

/// Admin input for a new question.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resolution_criteria: String,
    #[serde(default)]
    pub category: Category,
    pub close_date: DateTime<Utc>,
}

/// Community input for a question suggestion.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSuggestion {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub category: Category,
    pub close_date: DateTime<Utc>,
}

/// A question with its live community view.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: Question,
    pub community: CommunityPrediction,
    /// Only one person has forecast so far; show it as a reading, not a consensus.
    pub single_forecast: bool,
    pub accepting_predictions: bool,
}

/// One user's activity across the board.
#[derive(Debug, Clone, Serialize)]
pub struct UserPredictions {
    pub user_id: Uuid,
    pub questions: Vec<QuestionPredictionSummary>,
    pub stats: UserStats,
}

pub struct ForecastService<P: EventPersister, S: EventSource> {
    engine: Engine<Event, ForecastState, ForecastProjector, P>,
    board: Arc<ForecastBoard<S>>,
}

fn require_admin(identity: &Identity) -> Result<Uuid, AdminError> {
    let user_id = identity.user_id.ok_or(AdminError::Unauthenticated)?;
    if !identity.is_admin {
        return Err(AdminError::NotAdmin);
    }
    Ok(user_id)
}

fn required_text(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn future_close_date(close_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ServiceError> {
    if close_date <= now {
        return Err(ServiceError::Invalid("close_date must be in the future".into()));
    }
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl<P: EventPersister, S: EventSource> ForecastService<P, S> {
    pub fn new(persister: P, board: Arc<ForecastBoard<S>>) -> Self {
        Self {
            engine: Engine::new(ForecastProjector, persister),
            board,
        }
    }

    pub fn board(&self) -> &Arc<ForecastBoard<S>> {
        &self.board
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Validate and record a prediction. Earlier predictions by the same user
    /// stay in the log; this one becomes their current belief.
    pub async fn submit_prediction(
        &self,
        identity: &Identity,
        question_id: Uuid,
        probability: Option<f64>,
        reasoning: Option<&str>,
    ) -> Result<Prediction, ServiceError> {
        let mut state = self.board.write().await;
        let question = state
            .question(question_id)
            .ok_or(ServiceError::QuestionNotFound(question_id))?;

        let draft = validate_submission(identity, question, probability, reasoning, Utc::now())?;

        let prediction_id = Uuid::new_v4();
        let event = Event::PredictionSubmitted {
            prediction_id,
            question_id: draft.question_id,
            user_id: draft.user_id,
            probability: draft.probability,
            reasoning: draft.reasoning.clone(),
            submitted_at: draft.submitted_at,
            user_display: draft.user_display.clone(),
        };
        let stored = self.engine.dispatch(event, &mut state).await?;

        info!(
            %question_id,
            user_id = %draft.user_id,
            probability = draft.probability,
            seq = stored.seq,
            "Prediction recorded"
        );

        Ok(Prediction {
            id: prediction_id,
            seq: stored.seq,
            question_id: draft.question_id,
            user_id: draft.user_id,
            probability: draft.probability,
            reasoning: draft.reasoning,
            created_at: draft.submitted_at,
            user_display: draft.user_display,
        })
    }

    pub async fn publish_question(
        &self,
        identity: &Identity,
        input: NewQuestion,
    ) -> Result<Question, ServiceError> {
        let admin_id = require_admin(identity)?;
        let now = Utc::now();
        let title = required_text("title", &input.title)?;
        future_close_date(input.close_date, now)?;

        let question_id = Uuid::new_v4();
        let event = Event::QuestionPublished {
            question_id,
            title,
            description: input.description.trim().to_string(),
            resolution_criteria: input.resolution_criteria.trim().to_string(),
            category: input.category,
            close_date: input.close_date,
            author_id: Some(admin_id),
            published_at: now,
            from_suggestion: None,
        };

        let mut state = self.board.write().await;
        self.engine.dispatch(event, &mut state).await?;
        info!(%question_id, %admin_id, "Question published");

        state
            .question(question_id)
            .cloned()
            .ok_or(ServiceError::QuestionNotFound(question_id))
    }

    /// Record the outcome of a question. Resolution is final: the check runs
    /// against a freshly caught-up board, and should two instances still
    /// race, the projection keeps the resolution recorded first.
    pub async fn resolve_question(
        &self,
        identity: &Identity,
        question_id: Uuid,
        outcome: Outcome,
    ) -> Result<Question, ServiceError> {
        let admin_id = require_admin(identity)?;
        self.catch_up_before("resolve").await;

        let mut state = self.board.write().await;
        let question = state
            .question(question_id)
            .ok_or(ServiceError::QuestionNotFound(question_id))?;
        if question.is_resolved() {
            return Err(ServiceError::AlreadyResolved(question_id));
        }

        let event = Event::QuestionResolved {
            question_id,
            outcome,
            resolved_by: admin_id,
            resolved_at: Utc::now(),
        };
        self.engine.dispatch(event, &mut state).await?;
        info!(%question_id, ?outcome, %admin_id, "Question resolved");

        state
            .question(question_id)
            .cloned()
            .ok_or(ServiceError::QuestionNotFound(question_id))
    }

    pub async fn submit_suggestion(
        &self,
        identity: &Identity,
        input: NewSuggestion,
    ) -> Result<QuestionSuggestion, ServiceError> {
        let user_id = identity.user_id.ok_or(AdminError::Unauthenticated)?;
        let now = Utc::now();
        let title = required_text("title", &input.title)?;
        future_close_date(input.close_date, now)?;

        let suggestion_id = Uuid::new_v4();
        let event = Event::SuggestionSubmitted {
            suggestion_id,
            title,
            description: non_blank(input.description.as_deref()),
            category: input.category,
            close_date: input.close_date,
            suggested_by: user_id,
            submitted_at: now,
        };

        let mut state = self.board.write().await;
        self.engine.dispatch(event, &mut state).await?;
        info!(%suggestion_id, %user_id, "Suggestion submitted");

        state
            .suggestion(suggestion_id)
            .cloned()
            .ok_or(ServiceError::SuggestionNotFound(suggestion_id))
    }

    /// Approve or reject a pending suggestion. Approval publishes the
    /// suggested question, recorded as caused by the review. As with
    /// resolution, the first review recorded in the log is the one that holds.
    pub async fn review_suggestion(
        &self,
        identity: &Identity,
        suggestion_id: Uuid,
        approved: bool,
        admin_note: Option<&str>,
    ) -> Result<Option<Question>, ServiceError> {
        let admin_id = require_admin(identity)?;
        self.catch_up_before("review").await;

        let mut state = self.board.write().await;
        let suggestion = state
            .suggestion(suggestion_id)
            .cloned()
            .ok_or(ServiceError::SuggestionNotFound(suggestion_id))?;
        if suggestion.status != SuggestionStatus::Pending {
            return Err(ServiceError::AlreadyReviewed(suggestion_id));
        }

        let now = Utc::now();
        let review = Event::SuggestionReviewed {
            suggestion_id,
            approved,
            admin_note: non_blank(admin_note),
            reviewed_by: admin_id,
            reviewed_at: now,
        };
        let stored = self.engine.dispatch(review, &mut state).await?;
        info!(%suggestion_id, approved, %admin_id, "Suggestion reviewed");

        if !approved {
            return Ok(None);
        }

        let question_id = Uuid::new_v4();
        let description = suggestion.description.unwrap_or_default();
        let publish = Event::QuestionPublished {
            question_id,
            title: suggestion.title,
            resolution_criteria: description.clone(),
            description,
            category: suggestion.category,
            close_date: suggestion.close_date,
            author_id: Some(admin_id),
            published_at: now,
            from_suggestion: Some(suggestion_id),
        };
        self.engine
            .dispatch_child(stored.seq, publish, &mut state)
            .await?;
        info!(%question_id, %suggestion_id, "Question published from suggestion");

        Ok(state.question(question_id).cloned())
    }

    /// Catch the projection up with facts written by other instances.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.board.refresh().await
    }

    /// Final-state checks go against the newest board we can get. A stale
    /// refresh does not block the command.
    async fn catch_up_before(&self, command: &str) {
        let outcome = self.board.refresh().await;
        if outcome.is_stale() {
            warn!(command, ?outcome, "Checking against a stale board");
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn detail(state: &ForecastState, question: &Question, now: DateTime<Utc>) -> QuestionDetail {
        let community =
            CommunityPrediction::from_predictions(question.id, state.predictions_for(question.id));
        QuestionDetail {
            question: question.clone(),
            single_forecast: community.is_single_forecast(),
            community,
            accepting_predictions: !question.is_closed(now),
        }
    }

    /// Questions newest first, optionally limited to one category.
    pub async fn list_questions(&self, category: Option<Category>) -> Vec<QuestionDetail> {
        let state = self.board.read().await;
        let now = Utc::now();
        state
            .questions()
            .into_iter()
            .filter(|q| category.is_none() || Some(q.category) == category)
            .map(|q| Self::detail(&state, q, now))
            .collect()
    }

    pub async fn question(&self, question_id: Uuid) -> Result<QuestionDetail, ServiceError> {
        let state = self.board.read().await;
        let question = state
            .question(question_id)
            .ok_or(ServiceError::QuestionNotFound(question_id))?;
        Ok(Self::detail(&state, question, Utc::now()))
    }

    pub async fn community(&self, question_id: Uuid) -> Result<CommunityPrediction, ServiceError> {
        Ok(self.question(question_id).await?.community)
    }

    /// Per-user threads for a question: current belief plus revisions.
    pub async fn prediction_groups(
        &self,
        question_id: Uuid,
    ) -> Result<Vec<UserPredictionGroup>, ServiceError> {
        let state = self.board.read().await;
        if state.question(question_id).is_none() {
            return Err(ServiceError::QuestionNotFound(question_id));
        }
        Ok(group_by_user(state.predictions_for(question_id)))
    }

    pub async fn history(&self, question_id: Uuid) -> Result<SeriesView, ServiceError> {
        let state = self.board.read().await;
        if state.question(question_id).is_none() {
            return Err(ServiceError::QuestionNotFound(question_id));
        }
        Ok(chart_view(history_series(state.predictions_for(question_id))))
    }

    fn all_scores(state: &ForecastState) -> Vec<QuestionScore> {
        state
            .questions()
            .into_iter()
            .filter(|q| q.is_resolved())
            .flat_map(|q| score_question(q, state.predictions_for(q.id)))
            .collect()
    }

    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let state = self.board.read().await;
        leaderboard(&Self::all_scores(&state))
    }

    pub async fn user_predictions(&self, user_id: Uuid) -> UserPredictions {
        let state = self.board.read().await;
        let predictions = state.predictions_by_user(user_id);
        let scores: Vec<QuestionScore> = Self::all_scores(&state)
            .into_iter()
            .filter(|s| s.user_id == user_id)
            .collect();

        UserPredictions {
            user_id,
            questions: group_by_question(&predictions),
            stats: user_stats(user_id, &predictions, &scores),
        }
    }

    pub async fn suggestions(
        &self,
        identity: &Identity,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<QuestionSuggestion>, ServiceError> {
        require_admin(identity)?;
        let state = self.board.read().await;
        Ok(state.suggestions(status).into_iter().cloned().collect())
    }
}
