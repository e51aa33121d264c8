//! Health check response.
//!
//! Ambient liveness surface reused as-is across the billing core; no HTTP framework is
//! wired to it here — exposing it over HTTP is the caller's concern (spec.md places the
//! HTTP/CLI framework out of scope for this crate).

use serde::Serialize;
use tracing::instrument;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service health status.
    pub status: String,
    /// Crate version from Cargo.toml.
    pub version: String,
}

impl HealthResponse {
    /// Create a new healthy response with the current crate version.
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Create a new healthy response with a custom version.
    pub fn healthy_with_version(version: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            version: version.into(),
        }
    }
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self::healthy()
    }
}

/// Health check function returning a `HealthResponse`.
#[instrument(name = "health.check")]
pub fn health_check() -> HealthResponse {
    HealthResponse::healthy()
}
