//! Unit-of-work storage abstraction.
//!
//! A [`Database`] is a cheap, cloneable handle (a connection pool, or a shared
//! in-memory table set). [`Database::begin`] opens a [`UnitOfWork`]; all reads
//! and writes of one operation go through it, and the operation ends with
//! exactly one of [`UnitOfWork::commit`] or [`UnitOfWork::rollback`].
//!
//! Dropping a unit of work without committing discards its writes, but callers
//! should prefer [`settle`], which rolls back explicitly so the failure is
//! visible in the logs.

use std::future::Future;
use thiserror::Error;

/// Errors raised by storage backends.
///
/// Constraint violations are classified so that callers can translate a
/// violated uniqueness rule into a domain conflict rather than a server error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    // ═══════════════════════════════════════════════════════════════════════
    // Constraint Violations
    // ═══════════════════════════════════════════════════════════════════════
    /// A uniqueness rule rejected the write.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation {
        /// Constraint (or index) name.
        constraint: String,
    },

    /// A referenced row is missing, or a row is still referenced.
    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation {
        /// Constraint name.
        constraint: String,
    },

    /// A check constraint rejected the row.
    #[error("check constraint violated: {constraint}")]
    CheckViolation {
        /// Constraint name.
        constraint: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Backend Failures
    // ═══════════════════════════════════════════════════════════════════════
    /// The backend could not be reached or timed out.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A statement failed for any other reason.
    #[error("query failed: {0}")]
    Query(String),

    /// A stored row could not be decoded into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Whether this error is the given uniqueness rule.
    #[must_use]
    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(self, Self::UniqueViolation { constraint } if constraint == name)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A transactional scope over the backing store.
pub trait UnitOfWork: Send + Sized {
    /// Make every write of this unit of work durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the commit.
    fn commit(self) -> impl Future<Output = StorageResult<()>> + Send;

    /// Discard every write of this unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be told to roll back.
    fn rollback(self) -> impl Future<Output = StorageResult<()>> + Send;
}

/// A handle that opens units of work.
pub trait Database: Clone + Send + Sync + 'static {
    /// The unit of work type handed out by [`Database::begin`].
    type Tx: UnitOfWork;

    /// Open a new unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if no connection can be obtained.
    fn begin(&self) -> impl Future<Output = StorageResult<Self::Tx>> + Send;
}

/// Finish a unit of work according to the outcome of the work done in it.
///
/// Commits on `Ok` and rolls back on `Err`. A failed commit is reported as the
/// operation's error; a failed rollback is logged and the original error wins.
///
/// # Errors
///
/// Returns the operation's own error, or the commit failure.
pub async fn settle<Tx, T, E>(tx: Tx, outcome: Result<T, E>) -> Result<T, E>
where
    Tx: UnitOfWork,
    E: From<StorageError>,
{
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU8, Ordering};

    const COMMITTED: u8 = 1;
    const ROLLED_BACK: u8 = 2;

    struct TrackedTx(Arc<AtomicU8>);

    impl UnitOfWork for TrackedTx {
        async fn commit(self) -> StorageResult<()> {
            self.0.store(COMMITTED, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(self) -> StorageResult<()> {
            self.0.store(ROLLED_BACK, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn settle_commits_success() {
        let state = Arc::new(AtomicU8::new(0));
        let outcome: Result<u32, StorageError> = Ok(7);
        let value = settle(TrackedTx(Arc::clone(&state)), outcome).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(state.load(Ordering::SeqCst), COMMITTED);
    }

    #[tokio::test]
    async fn settle_rolls_back_failure() {
        let state = Arc::new(AtomicU8::new(0));
        let outcome: Result<u32, StorageError> = Err(StorageError::Query("boom".into()));
        let err = settle(TrackedTx(Arc::clone(&state)), outcome).await.unwrap_err();
        assert_eq!(err, StorageError::Query("boom".into()));
        assert_eq!(state.load(Ordering::SeqCst), ROLLED_BACK);
    }

    #[test]
    fn unique_violation_matches_by_name() {
        let err = StorageError::UniqueViolation {
            constraint: "bookings_slot_date_key".into(),
        };
        assert!(err.is_unique_violation_of("bookings_slot_date_key"));
        assert!(!err.is_unique_violation_of("rooms_room_number_key"));
    }
}
