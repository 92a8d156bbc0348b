use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::debug;

use futurykon_common::Identity;

use crate::AppState;

/// Who is calling. No `Authorization` header means an anonymous identity;
/// a header with a bad token is rejected outright rather than downgraded.
pub struct CurrentIdentity(pub Identity);

impl FromRequestParts<Arc<AppState>> for CurrentIdentity {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(header_value) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(CurrentIdentity(Identity::anonymous()));
        };

        let token = header_value
            .to_str()
            .ok()
            .and_then(parse_bearer)
            .ok_or_else(|| unauthorized("Malformed Authorization header"))?;

        let claims = state.jwt.verify_token(token).map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            unauthorized("Invalid or expired token")
        })?;
        let user_id = claims
            .user_id()
            .map_err(|_| unauthorized("Token subject is not a user"))?;

        let identity = if state.admin_user_ids.contains(&user_id) {
            Identity::admin(user_id)
        } else {
            Identity::user(user_id)
        };
        Ok(CurrentIdentity(identity.with_display(claims.display())))
    }
}

/// Extract the token from a `Bearer <token>` header value.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}
