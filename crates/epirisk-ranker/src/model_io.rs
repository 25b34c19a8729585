//! Persistence of trained predictors.
//!
//! ```text
//! <model_dir>/
//!   20250104-120000/
//!     model.json      {intercept, coefficients, feature_names}
//!     metadata.json   {version, trained_at, n_features}
//!   latest -> 20250104-120000
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use epirisk_common::error::{EpiRiskError, Result};
use epirisk_kb::KnowledgeBase;

use crate::features::feature_names;
use crate::predictor::{LinearModel, LinearPredictor, RiskPredictor};

pub const MODEL_FILE: &str = "model.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const LATEST_LINK: &str = "latest";
pub const DEFAULT_MODEL_VERSION: &str = "linear-unknown";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub n_features: Option<usize>,
}

/// Load the most recent model under `model_dir`.
///
/// Prefers `latest` (symlink or directory), otherwise the greatest
/// timestamped subdirectory. Every failure is `PredictorUnavailable`.
pub fn load_latest(model_dir: &Path, kb: &KnowledgeBase) -> Result<Arc<dyn RiskPredictor>> {
    let dir = resolve_latest(model_dir)?;
    let predictor = load_model(&dir, kb)?;
    info!("Loaded predictor {} from {}", predictor.version(), dir.display());
    Ok(predictor)
}

/// Load the model stored directly in `dir`.
pub fn load_model(dir: &Path, kb: &KnowledgeBase) -> Result<Arc<dyn RiskPredictor>> {
    let model_path = dir.join(MODEL_FILE);
    let raw = std::fs::read_to_string(&model_path).map_err(|e| {
        EpiRiskError::PredictorUnavailable(format!("cannot read {}: {e}", model_path.display()))
    })?;
    let model: LinearModel = serde_json::from_str(&raw).map_err(|e| {
        EpiRiskError::PredictorUnavailable(format!("invalid model {}: {e}", model_path.display()))
    })?;

    let expected = feature_names(kb);
    if !model.feature_names.is_empty() && model.feature_names != expected {
        return Err(EpiRiskError::PredictorUnavailable(format!(
            "model features ({}) do not match knowledge base {} ({})",
            model.feature_names.len(),
            kb.version(),
            expected.len()
        )));
    }
    if model.coefficients.len() != expected.len() {
        return Err(EpiRiskError::PredictorUnavailable(format!(
            "model has {} coefficients, feature layout has {}",
            model.coefficients.len(),
            expected.len()
        )));
    }

    let version = read_metadata(dir)
        .version
        .unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_string());
    Ok(Arc::new(LinearPredictor::new(model, version)))
}

/// Persist `model` under a new timestamped directory and point `latest` at it.
pub fn save_model(model_dir: &Path, model: &LinearModel) -> Result<PathBuf> {
    let now = Utc::now();
    let stamp = now.format("%Y%m%d-%H%M%S").to_string();
    let dir = model_dir.join(&stamp);
    std::fs::create_dir_all(&dir)?;

    std::fs::write(dir.join(MODEL_FILE), serde_json::to_vec_pretty(model)?)?;
    let metadata = ModelMetadata {
        version: Some(format!("linear-{stamp}")),
        trained_at: Some(now),
        n_features: Some(model.coefficients.len()),
    };
    std::fs::write(dir.join(METADATA_FILE), serde_json::to_vec_pretty(&metadata)?)?;

    update_latest(model_dir, &stamp)?;
    Ok(dir)
}

fn read_metadata(dir: &Path) -> ModelMetadata {
    let path = dir.join(METADATA_FILE);
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return ModelMetadata::default();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("Ignoring unreadable {}: {e}", path.display());
        ModelMetadata::default()
    })
}

fn resolve_latest(model_dir: &Path) -> Result<PathBuf> {
    let latest = model_dir.join(LATEST_LINK);
    if latest.is_dir() {
        return Ok(latest);
    }

    let entries = std::fs::read_dir(model_dir).map_err(|e| {
        EpiRiskError::PredictorUnavailable(format!("cannot list {}: {e}", model_dir.display()))
    })?;
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.path())
        .filter(|path| path.file_name().is_some_and(|n| n != LATEST_LINK))
        .max()
        .ok_or_else(|| {
            EpiRiskError::PredictorUnavailable(format!("no models in {}", model_dir.display()))
        })
}

#[cfg(unix)]
fn update_latest(model_dir: &Path, target: &str) -> Result<()> {
    let link = model_dir.join(LATEST_LINK);
    if link.symlink_metadata().is_ok() {
        std::fs::remove_file(&link)?;
    }
    std::os::unix::fs::symlink(target, &link)?;
    Ok(())
}

#[cfg(not(unix))]
fn update_latest(_model_dir: &Path, _target: &str) -> Result<()> {
    // Without symlinks the greatest timestamped directory wins.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use epirisk_test_utils::fixture_kb;

    fn zero_model(kb: &KnowledgeBase) -> LinearModel {
        let names = feature_names(kb);
        LinearModel { intercept: -1.0, coefficients: vec![0.0; names.len()], feature_names: names }
    }

    #[test]
    fn test_empty_dir_is_unavailable() {
        let kb = fixture_kb();
        let dir = tempfile::tempdir().unwrap();
        let err = load_latest(dir.path(), &kb).err().unwrap();
        assert!(matches!(err, EpiRiskError::PredictorUnavailable(_)));

        let missing = dir.path().join("nope");
        assert!(load_latest(&missing, &kb).is_err());
    }

    #[test]
    fn test_save_then_load_latest() {
        let kb = fixture_kb();
        let dir = tempfile::tempdir().unwrap();
        let saved = save_model(dir.path(), &zero_model(&kb)).unwrap();
        assert!(saved.join(MODEL_FILE).exists());

        let predictor = load_latest(dir.path(), &kb).unwrap();
        assert!(predictor.version().starts_with("linear-"));
    }

    #[test]
    fn test_greatest_subdir_without_metadata() {
        let kb = fixture_kb();
        let dir = tempfile::tempdir().unwrap();
        let mut model = zero_model(&kb);
        for stamp in ["20240101-000000", "20250101-000000"] {
            let sub = dir.path().join(stamp);
            std::fs::create_dir_all(&sub).unwrap();
            model.intercept += 1.0;
            std::fs::write(sub.join(MODEL_FILE), serde_json::to_string(&model).unwrap()).unwrap();
        }

        let predictor = load_latest(dir.path(), &kb).unwrap();
        assert_eq!(predictor.version(), DEFAULT_MODEL_VERSION);
        let p = predictor
            .predict_probability(&vec![0.0; feature_names(&kb).len()])
            .unwrap();
        // intercept 1.0 from the later directory
        assert!((p - 1.0 / (1.0 + (-1.0f64).exp())).abs() < 1e-9);
    }

    #[test]
    fn test_mismatched_features_rejected() {
        let kb = fixture_kb();
        let dir = tempfile::tempdir().unwrap();
        let mut model = zero_model(&kb);
        model.feature_names[0] = "tag_SOMETHING_else".into();
        let sub = dir.path().join(LATEST_LINK);
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join(MODEL_FILE), serde_json::to_string(&model).unwrap()).unwrap();

        let err = load_latest(dir.path(), &kb).err().unwrap();
        assert!(err.to_string().contains("do not match"));
    }
}
