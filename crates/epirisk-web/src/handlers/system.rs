//! Service metadata, health and version reporting.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub model_available: bool,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub api_version: String,
    pub model_version: String,
    pub knowledge_version: String,
}

/// GET /: service description and endpoint index.
pub async fn root(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let api = &state.config.api;
    Json(serde_json::json!({
        "message": api.title,
        "description": api.description,
        "version": api.version,
        "endpoints": {
            "health": "/healthz",
            "version": "/version",
            "score": "/v1/score",
            "score_file": "/v1/score-file",
            "model_reload": "/v1/model/reload",
        },
    }))
}

/// GET /healthz
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: state.config.api.version.clone(),
        model_available: state.model_available(),
    })
}

/// GET /version
pub async fn version_info(State(state): State<SharedState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        api_version: state.config.api.version.clone(),
        model_version: state.scorer.model_version(),
        knowledge_version: state.scorer.knowledge_base().version().to_string(),
    })
}
