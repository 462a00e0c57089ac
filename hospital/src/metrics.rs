//! Business metrics for the hospital backend.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `hospital_admissions_total` - Patients admitted
//! - `hospital_discharges_total` - Patients discharged
//! - `hospital_payments_total` - Payments and charges recorded on admissions
//! - `hospital_bookings_total{priority}` - Appointments booked
//! - `hospital_booking_conflicts_total{reason}` - Bookings refused for slot contention
//! - `hospital_slots_created_total` - Availability slots published
//! - `hospital_slot_conflicts_total` - Slot publications refused for overlap
//! - `hospital_notifications_total{kind, outcome}` - Notification deliveries
//!
//! ## Gauges
//! - `hospital_open_admissions` - Open admissions at the last listing

use crate::types::Priority;
use metrics::{describe_counter, describe_gauge};

/// Register metric descriptions. Call once at startup, before any recording.
pub fn register_hospital_metrics() {
    // Ward
    describe_counter!("hospital_admissions_total", "Total number of patients admitted");
    describe_counter!("hospital_discharges_total", "Total number of patients discharged");
    describe_counter!(
        "hospital_payments_total",
        "Total number of payments and charges recorded on admissions"
    );
    describe_gauge!(
        "hospital_open_admissions",
        "Number of open admissions at the last admitted-patients listing"
    );

    // Scheduling
    describe_counter!(
        "hospital_bookings_total",
        "Total number of appointments booked by priority (normal, emergency)"
    );
    describe_counter!(
        "hospital_booking_conflicts_total",
        "Bookings refused because the slot was taken (slot_unavailable, already_booked, race)"
    );
    describe_counter!("hospital_slots_created_total", "Total number of slots published");
    describe_counter!(
        "hospital_slot_conflicts_total",
        "Slot publications refused because they overlap existing slots"
    );

    // Notifications
    describe_counter!(
        "hospital_notifications_total",
        "Notification deliveries by kind and outcome (delivered, failed)"
    );

    tracing::info!("Hospital metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record an admission.
pub fn record_admission() {
    metrics::counter!("hospital_admissions_total").increment(1);
}

/// Record a discharge.
pub fn record_discharge() {
    metrics::counter!("hospital_discharges_total").increment(1);
}

/// Record a payment or charge on an admission.
pub fn record_payment() {
    metrics::counter!("hospital_payments_total").increment(1);
}

/// Update the open admissions gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_open_admissions(count: usize) {
    metrics::gauge!("hospital_open_admissions").set(count as f64);
}

/// Record a booked appointment.
pub fn record_booking(priority: Priority) {
    metrics::counter!("hospital_bookings_total", "priority" => priority.as_str()).increment(1);
}

/// Record a refused booking.
///
/// # Arguments
///
/// * `reason` - `slot_unavailable`, `already_booked` or `race`
pub fn record_booking_conflict(reason: &'static str) {
    metrics::counter!("hospital_booking_conflicts_total", "reason" => reason).increment(1);
    tracing::debug!(reason, "Recorded booking conflict");
}

/// Record published slots.
pub fn record_slots_created(count: usize) {
    metrics::counter!("hospital_slots_created_total").increment(count as u64);
}

/// Record a refused slot publication.
pub fn record_slot_conflict() {
    metrics::counter!("hospital_slot_conflicts_total").increment(1);
}

/// Record the outcome of one notification delivery.
pub fn record_notification(kind: &'static str, delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    metrics::counter!("hospital_notifications_total", "kind" => kind, "outcome" => outcome)
        .increment(1);
}
