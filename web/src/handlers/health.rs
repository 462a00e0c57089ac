//! Health check endpoints.
//!
//! `/health` answers as long as the process serves requests; readiness
//! additionally reports whether the storage backend answered.

use axum::{Json, http::StatusCode};
use serde::Serialize;

/// Body of a health response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    /// `"ok"` or `"unavailable"`.
    pub status: &'static str,
    /// Failure detail, when unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Liveness check.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthReport>) {
    (
        StatusCode::OK,
        Json(HealthReport {
            status: "ok",
            detail: None,
        }),
    )
}

/// Turn a dependency check into a readiness response (200 or 503).
#[must_use]
pub fn readiness<E: std::fmt::Display>(check: Result<(), E>) -> (StatusCode, Json<HealthReport>) {
    match check {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthReport {
                status: "ok",
                detail: None,
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthReport {
                    status: "unavailable",
                    detail: Some(err.to_string()),
                }),
            )
        }
    }
}
