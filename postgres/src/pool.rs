use crate::{PostgresConfig, classify};
use medbay_core::storage::StorageError;
use medbay_runtime::retry::{RetryPolicy, retry_when};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;

/// Build a connection pool from `config`.
///
/// Every pooled connection carries the configured `statement_timeout`, which
/// is the only cancellation bound on storage calls. Connection attempts are
/// retried with `policy` while the server is unreachable; malformed URLs and
/// authentication failures are returned immediately.
///
/// # Errors
///
/// Returns [`StorageError::Unavailable`] when the server stays unreachable and
/// [`StorageError::Query`] when the URL or credentials are rejected.
pub async fn connect(config: &PostgresConfig, policy: &RetryPolicy) -> Result<PgPool, StorageError> {
    let options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| StorageError::Query(format!("invalid DATABASE_URL: {e}")))?
        .options([("statement_timeout", format!("{}s", config.statement_timeout))]);

    let pool_options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .idle_timeout(Duration::from_secs(config.idle_timeout));

    let pool = retry_when(
        policy,
        "postgres_connect",
        || pool_options.clone().connect_with(options.clone()),
        |err| matches!(err, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut),
    )
    .await
    .map_err(classify)?;

    tracing::info!(
        max_connections = config.max_connections,
        statement_timeout_secs = config.statement_timeout,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}
