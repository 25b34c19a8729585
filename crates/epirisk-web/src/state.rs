//! Shared application state for the web server.

use std::sync::Arc;

use tracing::{info, warn};

use epirisk_kb::KnowledgeBase;
use epirisk_ranker::{model_io, PredictorSlot, RiskScorer};

use crate::config::Config;

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub config: Config,
    pub scorer: RiskScorer,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Load the knowledge base from `config.paths.data_dir` (or the bundled
    /// tables) and try to install the latest persisted predictor.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let kb = KnowledgeBase::load_or_bundled(Some(&config.paths.data_dir))?;
        info!("Knowledge base {} loaded ({} drugs)", kb.version(), kb.drug_names().len());

        let state = Self::from_parts(config, Arc::new(kb), Arc::new(PredictorSlot::empty()));
        state.reload_predictor();
        Ok(state)
    }

    pub fn from_parts(config: Config, kb: Arc<KnowledgeBase>, predictor: Arc<PredictorSlot>) -> Self {
        Self { config, scorer: RiskScorer::new(kb, predictor) }
    }

    /// Replace the active predictor with the latest one on disk.
    /// When nothing loadable is found the slot is cleared and scoring
    /// continues with the deterministic rules. Returns the loaded version.
    pub fn reload_predictor(&self) -> Option<String> {
        let slot = self.scorer.predictor_slot();
        match model_io::load_latest(&self.config.paths.model_dir, self.scorer.knowledge_base()) {
            Ok(predictor) => {
                let version = predictor.version().to_string();
                slot.swap(predictor);
                Some(version)
            }
            Err(e) => {
                if slot.clear().is_some() {
                    warn!("Predictor unloaded: {e}");
                } else {
                    info!("No predictor available ({e}); using deterministic rules");
                }
                None
            }
        }
    }

    pub fn model_available(&self) -> bool {
        self.scorer.predictor_slot().is_loaded()
    }
}
