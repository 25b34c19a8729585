//! epirisk-common: Shared types, errors, and helpers used across all Epi-Risk crates.

pub mod error;
pub mod entities;

// Re-export commonly used types
pub use entities::{
    AlternativeAssessment, FunctionalTag, RawVariant, Rationale, RiskLabel, SafetyStatus,
    ScoreResponse, ScoreResult, SnpCall, StarCall, ValidatedAlternatives, VariantRecord,
};
pub use error::{ApiError, EpiRiskError, Result};
