use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use futurykon_engine::{AdminError, ServiceError};
use futurykon_forecast::SubmissionError;

/// A `ServiceError` on its way out as an HTTP response.
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError(e)
    }
}

pub fn status_for(e: &ServiceError) -> StatusCode {
    match e {
        ServiceError::Submission(SubmissionError::Unauthenticated)
        | ServiceError::Admin(AdminError::Unauthenticated) => StatusCode::UNAUTHORIZED,
        ServiceError::Admin(AdminError::NotAdmin) => StatusCode::FORBIDDEN,
        ServiceError::Submission(SubmissionError::MissingProbability)
        | ServiceError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Submission(SubmissionError::QuestionClosed { .. })
        | ServiceError::AlreadyResolved(_)
        | ServiceError::AlreadyReviewed(_) => StatusCode::CONFLICT,
        ServiceError::QuestionNotFound(_) | ServiceError::SuggestionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ServiceError::Persist(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = match &self.0 {
            ServiceError::Persist(e) => {
                error!(error = %e, "Event log write failed");
                "Could not save right now, please try again".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
