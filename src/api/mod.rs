//! HTTP surface: question answering and a health probe.

pub mod ask;
pub mod status;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::error::FaqError;
use crate::state::AppState;

pub type ApiError = (StatusCode, Json<Value>);

/// All routes with request tracing.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/ask-question", post(ask::ask_question))
        .route("/api/health", get(status::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Bad input is the caller's fault, a missing index is temporary, anything
/// else is ours.
pub fn status_for(error: &FaqError) -> StatusCode {
    match error {
        FaqError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        FaqError::IndexUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<FaqError> for (StatusCode, Json<Value>) {
    fn from(error: FaqError) -> Self {
        let status = status_for(&error);
        match status {
            StatusCode::BAD_REQUEST => error_body(status, error.to_string()),
            StatusCode::SERVICE_UNAVAILABLE => {
                tracing::warn!("Request failed: {error}");
                error_body(status, "Search index unavailable. Try again later.")
            }
            _ => {
                // Provider bodies and file paths stay in the log.
                tracing::error!("Request failed: {error}");
                error_body(status, "Internal Server Error during similarity search.")
            }
        }
    }
}
