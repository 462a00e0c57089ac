//! Handlers shared across services.

pub mod health;
