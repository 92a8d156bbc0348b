use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use futurykon_common::{Prediction, QuestionSuggestion};
use futurykon_engine::NewSuggestion;

use crate::auth::CurrentIdentity;
use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
pub struct PredictionRequest {
    probability: Option<f64>,
    reasoning: Option<String>,
}

/// Record a prediction. A repeat submission by the same user is a revision:
/// it is appended, never merged into the earlier one.
pub async fn api_submit_prediction(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(question_id): Path<Uuid>,
    Json(body): Json<PredictionRequest>,
) -> Result<(StatusCode, Json<Prediction>), ApiError> {
    let prediction = state
        .service
        .submit_prediction(
            &identity,
            question_id,
            body.probability,
            body.reasoning.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(prediction)))
}

pub async fn api_submit_suggestion(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(body): Json<NewSuggestion>,
) -> Result<(StatusCode, Json<QuestionSuggestion>), ApiError> {
    let suggestion = state.service.submit_suggestion(&identity, body).await?;
    Ok((StatusCode::CREATED, Json(suggestion)))
}
