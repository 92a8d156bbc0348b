pub mod admin;
pub mod submit;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use futurykon_common::Category;
use futurykon_engine::{QuestionDetail, UserPredictions};
use futurykon_forecast::{CommunityPrediction, LeaderboardEntry, SeriesView, UserPredictionGroup};

use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
pub struct QuestionsQuery {
    category: Option<Category>,
}

/// Question list. `stale` tells the client the data may lag behind the log
/// (last refresh failed); the list itself is still the last good one.
pub async fn api_questions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuestionsQuery>,
) -> impl IntoResponse {
    let questions = state.service.list_questions(query.category).await;
    let status = state.service.board().status().await;
    Json(json!({
        "questions": questions,
        "stale": status.stale,
    }))
}

/// Category keys with their display labels.
pub async fn api_categories() -> impl IntoResponse {
    let categories: Vec<_> = Category::ALL
        .iter()
        .map(|c| json!({ "value": c, "label": c.label() }))
        .collect();
    Json(categories)
}

pub async fn api_question_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuestionDetail>, ApiError> {
    Ok(Json(state.service.question(id).await?))
}

pub async fn api_question_community(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommunityPrediction>, ApiError> {
    Ok(Json(state.service.community(id).await?))
}

pub async fn api_question_predictions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<UserPredictionGroup>>, ApiError> {
    Ok(Json(state.service.prediction_groups(id).await?))
}

pub async fn api_question_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SeriesView>, ApiError> {
    Ok(Json(state.service.history(id).await?))
}

pub async fn api_leaderboard(State(state): State<Arc<AppState>>) -> Json<Vec<LeaderboardEntry>> {
    Json(state.service.leaderboard().await)
}

pub async fn api_user_predictions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<UserPredictions> {
    Json(state.service.user_predictions(id).await)
}

pub async fn api_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.board().status().await)
}

/// Manual refresh. Always 200: a failed read is reported in the body while
/// the previous data keeps being served.
pub async fn api_refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = state.service.refresh().await;
    let status = state.service.board().status().await;
    Json(json!({
        "outcome": outcome,
        "status": status,
    }))
}
