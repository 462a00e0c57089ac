use medbay_core::storage::StorageError;
use sqlx::error::ErrorKind;

/// SQLSTATE raised when `statement_timeout` cancels a statement.
const QUERY_CANCELED: &str = "57014";

/// Map a driver error onto the backend-neutral [`StorageError`].
///
/// Constraint violations keep the violated constraint's name so callers can
/// tell which uniqueness rule fired.
#[must_use]
pub fn classify(err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db) => {
            let constraint = db.constraint().unwrap_or_default().to_string();
            match db.kind() {
                ErrorKind::UniqueViolation => StorageError::UniqueViolation { constraint },
                ErrorKind::ForeignKeyViolation => StorageError::ForeignKeyViolation { constraint },
                ErrorKind::CheckViolation => StorageError::CheckViolation { constraint },
                _ if db.code().as_deref() == Some(QUERY_CANCELED) => {
                    StorageError::Unavailable(format!("statement timed out: {db}"))
                }
                _ => StorageError::Query(db.to_string()),
            }
        }
        sqlx::Error::Io(e) => StorageError::Unavailable(e.to_string()),
        sqlx::Error::PoolTimedOut => StorageError::Unavailable("connection pool timed out".into()),
        sqlx::Error::PoolClosed => StorageError::Unavailable("connection pool closed".into()),
        sqlx::Error::ColumnDecode { index, source } => {
            StorageError::Corrupt(format!("column {index}: {source}"))
        }
        other => StorageError::Query(other.to_string()),
    }
}
