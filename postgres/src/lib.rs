//! `PostgreSQL` backend for the medbay unit-of-work traits.
//!
//! - [`PostgresConfig`]: pool sizing and driver timeouts
//! - [`connect`]: builds a pool, retrying while the server is unreachable
//! - [`PgDatabase`] / [`PgUnitOfWork`]: `medbay_core::storage` over `sqlx` transactions
//! - [`classify`]: maps `sqlx` errors onto [`StorageError`](medbay_core::storage::StorageError)
//!
//! # Example
//!
//! ```ignore
//! use medbay_postgres::{PgDatabase, PostgresConfig, connect};
//! use medbay_runtime::RetryPolicy;
//!
//! let pool = connect(&PostgresConfig::default(), &RetryPolicy::default()).await?;
//! let db = PgDatabase::from_pool(pool);
//! let mut tx = db.begin().await?;
//! ```

mod config;
mod database;
mod error;
mod pool;

pub use config::PostgresConfig;
pub use database::{PgDatabase, PgUnitOfWork};
pub use error::classify;
pub use pool::connect;
