//! epirisk-web: HTTP surface for Epi-Risk.
//! Exposes:
//!   - Variant scoring from JSON or uploaded CSV/PDF reports
//!   - Health and version reporting
//!   - Hot reload of the statistical predictor

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
