//! # Hospital backend
//!
//! Room occupancy and admissions, doctor availability slots and appointment
//! booking, exposed over a JSON REST API.
//!
//! ## Components
//!
//! - [`occupancy::OccupancyEngine`]: the only writer of room occupancy;
//!   admits, discharges and keeps the payment ledger
//! - [`scheduling::SlotScheduler`]: publishes non-overlapping slots and binds
//!   them to appointments
//! - [`booking::BookingCoordinator`]: normal (slot-bound) and emergency
//!   bookings, status changes
//! - [`reminders::ReminderJob`]: periodic reminders for upcoming appointments
//! - [`store`]: record traits with `PostgreSQL` and in-memory backends
//! - [`api`] / [`server`]: Axum handlers and router
//!
//! Every multi-step mutation runs in one unit of work. Storage uniqueness
//! rules are the final word on concurrent bookings: a violation surfaces as
//! [`error::HospitalError::Conflict`], never as an internal error.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod auth;
pub mod booking;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notifications;
pub mod occupancy;
pub mod reminders;
pub mod scheduling;
pub mod server;
pub mod store;
pub mod types;

pub use booking::{BookAppointment, BookingCoordinator};
pub use error::{HospitalError, Result};
pub use occupancy::OccupancyEngine;
pub use scheduling::SlotScheduler;
pub use store::{HospitalStore, InMemoryStore};
