//! Optional statistical predictor and the slot holding the active one.

use std::fmt;
use std::sync::{Arc, RwLock};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// A model mapping a feature vector to an adverse-reaction probability.
pub trait RiskPredictor: Send + Sync {
    /// Probability in `[0, 1]`.
    fn predict_probability(&self, features: &[f32]) -> anyhow::Result<f64>;

    /// Version string reported as `model_version`.
    fn version(&self) -> &str;
}

/// Logistic regression over the feature layout in [`crate::features`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub feature_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LinearPredictor {
    model: LinearModel,
    version: String,
}

impl LinearPredictor {
    pub fn new(model: LinearModel, version: impl Into<String>) -> Self {
        Self { model, version: version.into() }
    }

    pub fn from_json(raw: &str, version: impl Into<String>) -> anyhow::Result<Self> {
        let model: LinearModel = serde_json::from_str(raw).context("parsing linear model")?;
        Ok(Self::new(model, version))
    }

    pub fn model(&self) -> &LinearModel {
        &self.model
    }
}

impl RiskPredictor for LinearPredictor {
    fn predict_probability(&self, features: &[f32]) -> anyhow::Result<f64> {
        if features.len() != self.model.coefficients.len() {
            bail!(
                "feature vector has {} entries, model expects {}",
                features.len(),
                self.model.coefficients.len()
            );
        }
        let z: f64 = self.model.intercept
            + self
                .model
                .coefficients
                .iter()
                .zip(features)
                .map(|(w, x)| w * f64::from(*x))
                .sum::<f64>();
        Ok(1.0 / (1.0 + (-z).exp()))
    }

    fn version(&self) -> &str {
        &self.version
    }
}

// ── Slot ─────────────────────────────────────────────────────────────────────

/// Holds the active predictor, if any.
///
/// Readers take a [`snapshot`](Self::snapshot) once per request; a reload
/// replaces the whole `Arc`, so in-flight requests keep the predictor they
/// started with.
#[derive(Default)]
pub struct PredictorSlot {
    inner: RwLock<Option<Arc<dyn RiskPredictor>>>,
}

impl PredictorSlot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(predictor: Arc<dyn RiskPredictor>) -> Self {
        Self { inner: RwLock::new(Some(predictor)) }
    }

    pub fn snapshot(&self) -> Option<Arc<dyn RiskPredictor>> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Install `predictor`, returning the previous one.
    pub fn swap(&self, predictor: Arc<dyn RiskPredictor>) -> Option<Arc<dyn RiskPredictor>> {
        self.replace(Some(predictor))
    }

    pub fn clear(&self) -> Option<Arc<dyn RiskPredictor>> {
        self.replace(None)
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_some()
    }

    fn replace(&self, next: Option<Arc<dyn RiskPredictor>>) -> Option<Arc<dyn RiskPredictor>> {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }
}

impl fmt::Debug for PredictorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self.snapshot().map(|p| p.version().to_string());
        f.debug_struct("PredictorSlot").field("version", &version).finish()
    }
}
