use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use futurykon_common::{Outcome, Question, QuestionSuggestion, SuggestionStatus};
use futurykon_engine::NewQuestion;

use crate::auth::CurrentIdentity;
use crate::error::ApiError;
use crate::AppState;

pub async fn api_publish_question(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(body): Json<NewQuestion>,
) -> Result<(StatusCode, Json<Question>), ApiError> {
    let question = state.service.publish_question(&identity, body).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    outcome: Outcome,
}

pub async fn api_resolve_question(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(question_id): Path<Uuid>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<Question>, ApiError> {
    let question = state
        .service
        .resolve_question(&identity, question_id, body.outcome)
        .await?;
    Ok(Json(question))
}

#[derive(Deserialize)]
pub struct SuggestionsQuery {
    status: Option<SuggestionStatus>,
}

pub async fn api_suggestions(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Query(query): Query<SuggestionsQuery>,
) -> Result<Json<Vec<QuestionSuggestion>>, ApiError> {
    Ok(Json(state.service.suggestions(&identity, query.status).await?))
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    approved: bool,
    admin_note: Option<String>,
}

pub async fn api_review_suggestion(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(suggestion_id): Path<Uuid>,
    Json(body): Json<ReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = state
        .service
        .review_suggestion(
            &identity,
            suggestion_id,
            body.approved,
            body.admin_note.as_deref(),
        )
        .await?;
    Ok(Json(json!({
        "suggestion_id": suggestion_id,
        "approved": body.approved,
        "question": question,
    })))
}
