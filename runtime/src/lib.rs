//! # Medbay Runtime
//!
//! Helpers for running fallible I/O from the hospital services: database
//! connection at startup and best-effort notification delivery both go
//! through [`retry::retry_when`].

pub mod retry;

pub use retry::{RetryPolicy, retry, retry_when};
