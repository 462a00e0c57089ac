//! Axum glue shared by the medbay HTTP services.
//!
//! - [`AppError`]: maps failures to a JSON body `{"error", "code", "conflict"?}`
//! - [`middleware::correlation_id_layer`]: tags every request with an
//!   `X-Correlation-ID` and a tracing span
//! - [`extractors::CorrelationId`]: reads that id inside handlers
//! - [`handlers::health`]: liveness and readiness responses

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::CorrelationId;
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
