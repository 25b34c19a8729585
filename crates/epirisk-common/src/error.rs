use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EpiRiskError {
    #[error("Unknown medication: {0}. Please provide a valid medication name or RxNorm code.")]
    UnknownMedication(String),

    #[error("Malformed variant record: {0}")]
    MalformedVariant(String),

    #[error("Predictor unavailable: {0}")]
    PredictorUnavailable(String),

    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    #[error("Variant extraction error: {0}")]
    Extraction(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EpiRiskError>;

/// Error returned from HTTP handlers.
///
/// Serialises as `{"detail": "..."}` with the matching status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, detail: detail.into() }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, detail: detail.into() }
    }
}

impl From<EpiRiskError> for ApiError {
    fn from(err: EpiRiskError) -> Self {
        match err {
            EpiRiskError::UnknownMedication(_)
            | EpiRiskError::MalformedVariant(_)
            | EpiRiskError::Extraction(_) => ApiError::bad_request(err.to_string()),
            other => {
                tracing::error!("Request failed: {other}");
                ApiError::internal(format!("Internal error: {other}"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
