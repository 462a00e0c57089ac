//! Application state shared across all HTTP handlers.

use crate::auth::Identity;
use crate::booking::BookingCoordinator;
use crate::occupancy::OccupancyEngine;
use crate::scheduling::SlotScheduler;
use axum::extract::FromRef;
use std::sync::Arc;

/// Engines and identity, cloned (cheaply via `Arc`) for each request.
///
/// Generic over the storage backend so the same router serves `PostgreSQL`
/// in production and the in-memory store in tests.
pub struct AppState<D> {
    /// Storage handle, used by the readiness check.
    pub db: D,
    /// Rooms, admissions and payments.
    pub occupancy: Arc<OccupancyEngine<D>>,
    /// Availability slots.
    pub scheduler: Arc<SlotScheduler<D>>,
    /// Appointments.
    pub bookings: Arc<BookingCoordinator<D>>,
    /// Bearer token resolution.
    pub identity: Identity,
}

impl<D: Clone> AppState<D> {
    /// Assemble the state.
    #[must_use]
    pub fn new(
        db: D,
        occupancy: OccupancyEngine<D>,
        scheduler: SlotScheduler<D>,
        bookings: BookingCoordinator<D>,
        identity: Identity,
    ) -> Self {
        Self {
            db,
            occupancy: Arc::new(occupancy),
            scheduler: Arc::new(scheduler),
            bookings: Arc::new(bookings),
            identity,
        }
    }
}

impl<D: Clone> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            occupancy: Arc::clone(&self.occupancy),
            scheduler: Arc::clone(&self.scheduler),
            bookings: Arc::clone(&self.bookings),
            identity: self.identity.clone(),
        }
    }
}

// Lets the `Authenticated` extractor reach the identity provider
impl<D: Clone> FromRef<AppState<D>> for Identity {
    fn from_ref(state: &AppState<D>) -> Self {
        state.identity.clone()
    }
}
