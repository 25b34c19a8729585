//! HTTP handlers for all routes.

pub mod model;
pub mod score;
pub mod system;
