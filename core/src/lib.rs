//! # Medbay Core
//!
//! Core traits shared by the medbay crates.
//!
//! ## Core Concepts
//!
//! - **Environment**: injected dependencies such as the [`environment::Clock`]
//! - **Storage**: a [`storage::Database`] hands out [`storage::UnitOfWork`]s.
//!   Every multi-step mutation runs inside exactly one unit of work, which is
//!   either committed or rolled back as a whole.
//!
//! Domain crates implement their record access as extension traits on the
//! unit of work type, so the same engine code runs against Postgres in
//! production and against an in-process store in tests.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub mod storage;
