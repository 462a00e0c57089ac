//! Slot and appointment endpoints.
//!
//! - POST /appointment/slots - Publish one slot
//! - POST /appointment/slots/recurring - Publish a weekly series
//! - GET /appointment/slots/:hcp_id/:day - Bookable slots on a day (public)
//! - GET /appointment/upcomingslots/:hcp_id - Bookable slots after today
//! - DELETE /appointment/slots/:slot_id - Remove an unbooked slot
//! - POST /appointment/book - Book an appointment
//! - PATCH /appointment/appointments/:appointment_id/status - Change status
//! - GET /appointment/appointments/:hcp_id - A doctor's appointments
//! - GET /appointment/appointments/patient/:patient_id - A patient's scheduled appointments
//! - GET /appointment/appointment/:appointment_id - One appointment

use super::{MessageResponse, calendar_day, clock_time, parse_day};
use crate::auth::{Authenticated, Capability, Principal, Role};
use crate::booking::BookAppointment;
use crate::error::HospitalError;
use crate::scheduling::{AddSlot, RecurringSlots, SlotView, parse_weekday};
use crate::server::state::AppState;
use crate::store::HospitalStore;
use crate::types::{
    Appointment, AppointmentId, AppointmentStatus, HcpId, PatientId, Priority, Slot, SlotId,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{NaiveDate, NaiveTime};
use medbay_web::AppError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to publish one slot.
#[derive(Debug, Deserialize)]
pub struct AddSlotRequest {
    /// Owning doctor
    pub hcp_id: HcpId,
    /// Calendar date
    #[serde(deserialize_with = "calendar_day")]
    pub slot_date: NaiveDate,
    /// Window start, `HH:MM[:SS]`
    #[serde(deserialize_with = "clock_time")]
    pub start_time: NaiveTime,
    /// Window end, `HH:MM[:SS]`
    #[serde(deserialize_with = "clock_time")]
    pub end_time: NaiveTime,
}

/// Response after publishing a slot.
#[derive(Debug, Serialize)]
pub struct AddSlotResponse {
    /// Success message
    pub message: String,
    /// The new slot
    pub slot: Slot,
}

/// Request to publish a weekly series of slots.
#[derive(Debug, Deserialize)]
pub struct RecurringSlotsRequest {
    /// Owning doctor
    pub hcp_id: HcpId,
    /// English weekday name
    pub day_of_week: String,
    /// Window start
    #[serde(deserialize_with = "clock_time")]
    pub start_time: NaiveTime,
    /// Window end
    #[serde(deserialize_with = "clock_time")]
    pub end_time: NaiveTime,
    /// Last date of the series, inclusive
    #[serde(deserialize_with = "calendar_day")]
    pub repeat_until: NaiveDate,
    /// First date of the series
    #[serde(deserialize_with = "calendar_day")]
    pub start_date: NaiveDate,
}

/// Response after publishing a series.
#[derive(Debug, Serialize)]
pub struct RecurringSlotsResponse {
    /// Success message
    pub message: String,
    /// Slots created
    pub count: usize,
    /// Dates that already had an identical slot
    pub skipped: usize,
}

/// Request to book an appointment.
#[derive(Debug, Deserialize)]
pub struct BookRequest {
    /// Slot to bind (normal bookings)
    pub slot_id: Option<SlotId>,
    /// Day to book the slot on (normal bookings)
    pub date: Option<String>,
    /// Patient
    pub patient_id: PatientId,
    /// `Normal` (default) or `Emergency`, any case
    pub priority: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Doctor; required for emergencies
    pub doctor_id: Option<HcpId>,
}

/// Response after booking.
#[derive(Debug, Serialize)]
pub struct BookResponse {
    /// Success message
    pub message: String,
    /// Created appointment ID
    pub appointment_id: AppointmentId,
}

/// Request to change an appointment's status.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// New status
    pub status: AppointmentStatus,
}

/// Response carrying one appointment.
#[derive(Debug, Serialize)]
pub struct AppointmentResponse {
    /// Success message
    pub message: String,
    /// The appointment
    pub appointment: Appointment,
}

/// Several appointments.
#[derive(Debug, Serialize)]
pub struct AppointmentsResponse {
    /// Newest first
    pub appointments: Vec<Appointment>,
}

fn parse_priority(raw: Option<&str>) -> Result<Priority, HospitalError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Priority::Normal),
        Some(label) if label.eq_ignore_ascii_case("normal") => Ok(Priority::Normal),
        Some(label) if label.eq_ignore_ascii_case("emergency") => Ok(Priority::Emergency),
        Some(other) => Err(HospitalError::validation(format!("unknown priority '{other}'"))),
    }
}

/// Professionals may only touch their own appointments; other staff may touch any.
fn require_hcp_scope(principal: &Principal, hcp_id: HcpId) -> Result<(), HospitalError> {
    if principal.role == Role::Hcp {
        principal.require_hcp(hcp_id)?;
    }
    Ok(())
}

// ============================================================================
// Handlers: slots
// ============================================================================

/// Publish one slot.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/appointment/slots \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"hcp_id": 7, "slot_date": "2025-03-14", "start_time": "09:00", "end_time": "09:30"}'
/// ```
pub async fn add_slot<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Json(request): Json<AddSlotRequest>,
) -> Result<(StatusCode, Json<AddSlotResponse>), AppError> {
    principal.require(Capability::ManageSlots)?;
    principal.require_hcp(request.hcp_id)?;

    let slot = state
        .scheduler
        .add_slot(AddSlot {
            hcp_id: request.hcp_id,
            date: request.slot_date,
            start: request.start_time,
            end: request.end_time,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddSlotResponse {
            message: "Slot added successfully".to_string(),
            slot,
        }),
    ))
}

/// Publish the same window every week between two dates. All or nothing.
pub async fn add_recurring_slots<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Json(request): Json<RecurringSlotsRequest>,
) -> Result<(StatusCode, Json<RecurringSlotsResponse>), AppError> {
    principal.require(Capability::ManageSlots)?;
    principal.require_hcp(request.hcp_id)?;

    let outcome = state
        .scheduler
        .publish_weekly(RecurringSlots {
            hcp_id: request.hcp_id,
            weekday: parse_weekday(&request.day_of_week)?,
            start: request.start_time,
            end: request.end_time,
            start_date: request.start_date,
            repeat_until: request.repeat_until,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RecurringSlotsResponse {
            message: format!("{} recurring slots created", outcome.created),
            count: outcome.created,
            skipped: outcome.skipped,
        }),
    ))
}

/// Bookable slots of a doctor on a day.
///
/// Public endpoint - no authentication required. `day` is `YYYY-MM-DD` or an
/// RFC 3339 timestamp; slot dates are presented at the display offset.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/appointment/slots/7/2025-03-14
/// ```
pub async fn available_slots<D: HospitalStore>(
    State(state): State<AppState<D>>,
    Path((hcp_id, day)): Path<(HcpId, String)>,
) -> Result<Json<Vec<SlotView>>, AppError> {
    let date = parse_day(&day)?;
    let slots = state.scheduler.available_slots(hcp_id, date).await?;
    Ok(Json(slots.collect()))
}

/// Bookable slots of a doctor dated after today.
pub async fn upcoming_slots<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Path(hcp_id): Path<HcpId>,
) -> Result<Json<Vec<Slot>>, AppError> {
    principal.require(Capability::ManageSlots)?;
    principal.require_hcp(hcp_id)?;

    Ok(Json(state.scheduler.upcoming_slots(hcp_id).await?))
}

/// Remove a slot nobody has booked.
pub async fn delete_slot<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Path(slot_id): Path<SlotId>,
) -> Result<Json<MessageResponse>, AppError> {
    principal.require(Capability::ManageSlots)?;
    let slot = state.scheduler.slot(slot_id).await?;
    principal.require_hcp(slot.hcp_id)?;

    state.scheduler.delete_slot(slot_id).await?;
    Ok(Json(MessageResponse::new("Slot deleted successfully")))
}

// ============================================================================
// Handlers: appointments
// ============================================================================

/// Book an appointment.
///
/// # Example
///
/// ```bash
/// # Normal booking: binds the slot for the day
/// curl -X POST http://localhost:8080/appointment/book \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"slot_id": 12, "date": "2025-03-14", "patient_id": 3}'
///
/// # Emergency: immediate, no slot
/// curl -X POST http://localhost:8080/appointment/book \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"patient_id": 3, "doctor_id": 7, "priority": "emergency"}'
/// ```
pub async fn book<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Json(request): Json<BookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    principal.require(Capability::BookAppointments)?;
    principal.require_patient_scope(request.patient_id)?;

    let priority = parse_priority(request.priority.as_deref())?;
    let date = request.date.as_deref().map(parse_day).transpose()?;

    let appointment = state
        .bookings
        .book(BookAppointment {
            patient_id: request.patient_id,
            hcp_id: request.doctor_id,
            slot_id: request.slot_id,
            date,
            priority,
            notes: request.notes,
        })
        .await?;

    let message = match priority {
        Priority::Emergency => "Emergency appointment booked immediately",
        Priority::Normal => "Appointment booked successfully",
    };
    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            message: message.to_string(),
            appointment_id: appointment.id,
        }),
    ))
}

/// Change an appointment's status; terminal statuses free its slot.
pub async fn update_status<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Path(appointment_id): Path<AppointmentId>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<AppointmentResponse>, AppError> {
    principal.require(Capability::UpdateAppointments)?;
    if principal.role == Role::Hcp {
        let current = state.bookings.appointment(appointment_id).await?;
        principal.require_hcp(current.hcp_id)?;
    }

    let appointment = state
        .bookings
        .update_status(appointment_id, request.status)
        .await?;
    Ok(Json(AppointmentResponse {
        message: format!("Appointment status updated to {}", appointment.status),
        appointment,
    }))
}

/// A doctor's appointments, newest first.
pub async fn doctor_appointments<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Path(hcp_id): Path<HcpId>,
) -> Result<Json<AppointmentsResponse>, AppError> {
    principal.require(Capability::ViewAppointments)?;
    principal.require_staff()?;
    require_hcp_scope(&principal, hcp_id)?;

    let appointments = state.bookings.appointments_for_doctor(hcp_id).await?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// A patient's scheduled appointments, newest first.
pub async fn patient_appointments<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Path(patient_id): Path<PatientId>,
) -> Result<Json<AppointmentsResponse>, AppError> {
    principal.require(Capability::ViewAppointments)?;
    principal.require_patient_scope(patient_id)?;

    let appointments = state.bookings.appointments_for_patient(patient_id).await?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// One appointment.
pub async fn get_appointment<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Path(appointment_id): Path<AppointmentId>,
) -> Result<Json<Appointment>, AppError> {
    principal.require(Capability::ViewAppointments)?;

    let appointment = state.bookings.appointment(appointment_id).await?;
    principal.require_patient_scope(appointment.patient_id)?;
    Ok(Json(appointment))
}
