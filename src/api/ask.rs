use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;

use crate::api::{error_body, ApiError};
use crate::models::{AskRequest, AskResponse};
use crate::state::AppState;

/// POST /ask-question - Answer from the FAQ when a close match exists,
/// otherwise from the generative model.
pub async fn ask_question(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    authorize(&state, &headers)?;

    let Json(req) = body.map_err(|e| {
        tracing::warn!("Invalid JSON payload: {e}");
        error_body(StatusCode::BAD_REQUEST, "Invalid JSON payload.")
    })?;

    let question = req.user_question.trim().to_string();
    if question.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "No question provided."));
    }

    let answer = state.router.resolve(&question).await?;
    Ok(Json(AskResponse::new(question, answer)))
}

/// Require `Authorization: Bearer <token>` when a token is configured.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.config.api_token.as_deref() else {
        return Ok(());
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    if provided.is_some_and(|p| tokens_match(p.as_bytes(), expected.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!("Rejected request with missing or invalid token");
        Err(error_body(StatusCode::FORBIDDEN, "Invalid or missing token."))
    }
}

/// Compare without stopping at the first differing byte.
fn tokens_match(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    provided
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
