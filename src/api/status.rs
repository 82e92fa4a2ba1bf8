use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when the index can serve searches, "unavailable" otherwise
    pub status: &'static str,
    pub backend: &'static str,
    pub entries: Option<usize>,
    pub embedding_model: String,
    pub similarity_threshold: f32,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let entries = match state.index.len().await {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!("Health check: {e}");
            None
        }
    };

    Json(HealthResponse {
        status: if entries.is_some() { "ok" } else { "unavailable" },
        backend: state.index.backend(),
        entries,
        embedding_model: state.embedding_model.clone(),
        similarity_threshold: state.router.threshold(),
    })
}
