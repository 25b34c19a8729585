//! epirisk-ranker: pharmacogenomic risk scoring engine.
//!
//! Pipeline: variants → [`mapper`] → [`pathways`] filter → [`rules`] score,
//! with [`alternatives`] re-running the same steps per substitute drug and
//! [`scorer`] orchestrating one request end to end.

pub mod mapper;
pub mod pathways;
pub mod rules;
pub mod alternatives;
pub mod features;
pub mod predictor;
pub mod model_io;
pub mod scorer;

pub use predictor::{LinearPredictor, PredictorSlot, RiskPredictor};
pub use scorer::{RiskScorer, ScoreRequest, DETERMINISTIC_MODEL_VERSION};
