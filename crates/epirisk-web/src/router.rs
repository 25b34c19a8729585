//! Axum router: all routes defined here.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{model, score, system};
use crate::state::{AppState, SharedState};

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes;
    let shared: SharedState = Arc::new(state);

    Router::new()
        // System
        .route("/",        get(system::root))
        .route("/healthz", get(system::health_check))
        .route("/version", get(system::version_info))

        // Scoring
        .route("/v1/score",      post(score::score_variants))
        .route("/v1/score-file", post(score::score_file))

        // Predictor
        .route("/v1/model/reload", post(model::reload_model))

        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
