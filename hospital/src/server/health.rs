//! Health check endpoints.
//!
//! Liveness comes from `medbay-web`; readiness opens and rolls back a unit of
//! work on the configured backend.

use super::state::AppState;
use crate::store::HospitalStore;
use axum::{Json, extract::State, http::StatusCode};
use medbay_core::storage::UnitOfWork;
use medbay_web::handlers::health::{HealthReport, readiness};

pub use medbay_web::handlers::health::health_check;

/// Readiness check endpoint.
///
/// Returns 200 when the storage backend completes a round trip, 503 otherwise.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"status":"ok"}
/// ```
pub async fn readiness_check<D: HospitalStore>(
    State(state): State<AppState<D>>,
) -> (StatusCode, Json<HealthReport>) {
    let attempt = match state.db.begin().await {
        Ok(tx) => tx.rollback().await,
        Err(err) => Err(err),
    };
    readiness(attempt)
}
