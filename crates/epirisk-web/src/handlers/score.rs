//! Scoring endpoints: JSON variants and uploaded genotype reports.

use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::{debug, info};

use epirisk_common::{ApiError, ScoreResponse};
use epirisk_ranker::ScoreRequest;

use crate::state::SharedState;

/// POST /v1/score: score a list of variants against one medication.
pub async fn score_variants(
    State(state): State<SharedState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, ApiError> {
    if request.variants.is_empty() {
        return Err(ApiError::bad_request("No variants provided"));
    }
    let response = state.scorer.score(&request)?;
    Ok(Json(response))
}

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<Upload>,
    medication_name: Option<String>,
    rxnorm: Option<String>,
    context: Option<String>,
}

#[derive(Debug)]
struct Upload {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// POST /v1/score-file: extract variants from a CSV or PDF upload, then score.
///
/// Form fields: `file` (required), `medication_name`, `rxnorm`, and
/// `context` as a JSON string.
pub async fn score_file(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<ScoreResponse>, ApiError> {
    let form = read_form(multipart).await?;
    let upload = form
        .file
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let context = match form.context.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(raw) => Some(
            serde_json::from_str::<serde_json::Value>(raw)
                .map_err(|_| ApiError::bad_request("Context must be valid JSON string"))?,
        ),
        None => None,
    };

    info!("Extracting variants from {} ({} bytes)", upload.filename, upload.bytes.len());
    let filename = upload.filename.clone();
    let variants = tokio::task::spawn_blocking(move || {
        epirisk_ingestion::extract_variants(
            &upload.filename,
            upload.content_type.as_deref(),
            &upload.bytes,
        )
    })
    .await
    .map_err(|e| ApiError::internal(format!("Extraction task failed: {e}")))??;

    if variants.is_empty() {
        return Err(ApiError::bad_request(
            "No variants could be extracted from file. Please check file format.",
        ));
    }
    debug!("{} variants extracted from {filename}", variants.len());

    let request = ScoreRequest {
        variants,
        medication_name: form.medication_name,
        rxnorm: form.rxnorm,
        context,
    };
    let response = state.scorer.score(&request)?;
    Ok(Json(response))
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Could not read upload: {e}")))?;
                form.file = Some(Upload { filename, content_type, bytes: bytes.to_vec() });
            }
            "medication_name" | "rxnorm" | "context" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Could not read field {name}: {e}")))?;
                let value = Some(value).filter(|v| !v.trim().is_empty());
                match name.as_str() {
                    "medication_name" => form.medication_name = value,
                    "rxnorm" => form.rxnorm = value,
                    _ => form.context = value,
                }
            }
            other => debug!("Ignoring form field {other:?}"),
        }
    }
    Ok(form)
}
