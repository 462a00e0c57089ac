//! Error taxonomy for hospital operations.
//!
//! Every operation fails with exactly one [`HospitalError`] kind, and each kind
//! maps to one HTTP status. Storage uniqueness violations are conflicts, never
//! internal errors.

use crate::store::constraints;
use crate::types::{InvalidAmount, Slot, UnknownVariant};
use medbay_core::storage::StorageError;
use medbay_web::AppError;
use thiserror::Error;

/// Result type for hospital operations.
pub type Result<T> = std::result::Result<T, HospitalError>;

/// Errors surfaced by hospital operations.
#[derive(Error, Debug)]
pub enum HospitalError {
    // ═══════════════════════════════════════════════════════════════════════
    // Caller errors
    // ═══════════════════════════════════════════════════════════════════════
    /// Malformed input or a violated precondition on the input itself.
    #[error("{0}")]
    Validation(String),

    /// Missing or unrecognised credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller may not perform this operation.
    #[error("{0}")]
    Forbidden(String),

    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Requested id or key.
        id: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // State conflicts
    // ═══════════════════════════════════════════════════════════════════════
    /// The request collides with current state.
    #[error("{message}")]
    Conflict {
        /// What collided.
        message: String,
        /// Existing slots the request overlapped, when relevant.
        conflicting_slots: Vec<Slot>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure
    // ═══════════════════════════════════════════════════════════════════════
    /// Storage failed for a reason other than a business rule.
    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl HospitalError {
    /// Build a [`HospitalError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a [`HospitalError::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Build a [`HospitalError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Build a [`HospitalError::Conflict`] without conflicting resources.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            conflicting_slots: Vec::new(),
        }
    }

    /// Build a [`HospitalError::Conflict`] echoing the overlapped slots.
    pub fn slot_overlap(message: impl Into<String>, slots: Vec<Slot>) -> Self {
        Self::Conflict {
            message: message.into(),
            conflicting_slots: slots,
        }
    }

    /// Whether this is a conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Human wording for the named storage rules.
fn describe_constraint(constraint: &str) -> String {
    match constraint {
        constraints::ROOM_NUMBER => "room number already exists".to_string(),
        constraints::SLOT_START => "a slot already starts at this time for this professional".to_string(),
        constraints::BOOKING_SLOT_DATE => "slot is already booked for this date".to_string(),
        constraints::BOOKING_APPOINTMENT => "appointment already holds a booking".to_string(),
        constraints::ONE_OPEN_ADMISSION => "patient already has an open admission".to_string(),
        constraints::ROOM_OCCUPANCY => "room occupancy would leave its bounds".to_string(),
        constraints::ADMISSION_ROOM => "room is referenced by admission history".to_string(),
        constraints::BOOKING_SLOT => "slot is referenced by bookings".to_string(),
        other => format!("storage rule {other} rejected the change"),
    }
}

impl From<StorageError> for HospitalError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UniqueViolation { constraint }
            | StorageError::ForeignKeyViolation { constraint }
            | StorageError::CheckViolation { constraint } => {
                Self::conflict(describe_constraint(&constraint))
            }
            other => Self::Storage(other),
        }
    }
}

impl From<InvalidAmount> for HospitalError {
    fn from(err: InvalidAmount) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<UnknownVariant> for HospitalError {
    fn from(err: UnknownVariant) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<HospitalError> for AppError {
    fn from(err: HospitalError) -> Self {
        match err {
            HospitalError::Validation(message) => Self::bad_request(message),
            HospitalError::Unauthorized(message) => Self::unauthorized(message),
            HospitalError::Forbidden(message) => Self::forbidden(message),
            err @ HospitalError::NotFound { .. } => Self::not_found(err.to_string()),
            HospitalError::Conflict {
                message,
                conflicting_slots,
            } => {
                let conflict = Self::conflict(message);
                if conflicting_slots.is_empty() {
                    conflict
                } else {
                    match serde_json::to_value(&conflicting_slots) {
                        Ok(slots) => conflict.with_conflict(slots),
                        Err(_) => conflict,
                    }
                }
            }
            HospitalError::Storage(source) => {
                Self::internal("An internal error occurred").with_source(source.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn uniqueness_violations_become_conflicts() {
        let err: HospitalError = StorageError::UniqueViolation {
            constraint: constraints::BOOKING_SLOT_DATE.to_string(),
        }
        .into();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "slot is already booked for this date");
    }

    #[test]
    fn backend_failures_stay_internal() {
        let err: HospitalError = StorageError::Unavailable("pool closed".into()).into();
        assert!(matches!(err, HospitalError::Storage(_)));
        assert_eq!(AppError::from(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn taxonomy_maps_to_statuses() {
        let cases = [
            (HospitalError::validation("bad"), StatusCode::BAD_REQUEST),
            (HospitalError::Unauthorized("who".into()), StatusCode::UNAUTHORIZED),
            (HospitalError::forbidden("no"), StatusCode::FORBIDDEN),
            (HospitalError::not_found("room", 4), StatusCode::NOT_FOUND),
            (HospitalError::conflict("taken"), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }
}
