//! Predictor hot reload.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use epirisk_common::ApiError;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub model_available: bool,
    pub model_version: String,
}

/// POST /v1/model/reload: swap in the latest persisted predictor.
/// Requests already in flight finish with the predictor they started with.
pub async fn reload_model(State(state): State<SharedState>) -> Result<Json<ReloadResponse>, ApiError> {
    let worker = state.clone();
    let loaded = tokio::task::spawn_blocking(move || worker.reload_predictor())
        .await
        .map_err(|e| ApiError::internal(format!("Model reload failed: {e}")))?;

    if let Some(version) = &loaded {
        info!("Predictor {version} active");
    }
    Ok(Json(ReloadResponse {
        model_available: loaded.is_some(),
        model_version: state.scorer.model_version(),
    }))
}
