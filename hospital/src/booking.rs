//! Booking Coordinator: appointments and their slot bindings.
//!
//! A normal booking creates the appointment and binds its slot in one unit of
//! work: either both exist afterwards or neither does. Emergency bookings skip
//! slots entirely and alert the doctor after commit.

use crate::error::{HospitalError, Result};
use crate::metrics;
use crate::notifications::{Notification, NotificationDispatcher};
use crate::scheduling::{bind_slot, release_slot};
use crate::store::{HospitalStore, ScheduleRecords, WardRecords};
use crate::types::{
    Appointment, AppointmentId, AppointmentStatus, Designation, HcpId, NewAppointment, PatientId,
    Priority, SlotId,
};
use chrono::NaiveDate;
use medbay_core::environment::Clock;
use medbay_core::storage::settle;
use std::sync::Arc;

/// Book an appointment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookAppointment {
    /// Patient.
    pub patient_id: PatientId,
    /// Professional; required for emergencies, checked against the slot otherwise.
    pub hcp_id: Option<HcpId>,
    /// Slot to bind; required for normal bookings.
    pub slot_id: Option<SlotId>,
    /// Date to book the slot on; required for normal bookings.
    pub date: Option<NaiveDate>,
    /// Booking path.
    pub priority: Priority,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Creates appointments and moves them through their lifecycle.
pub struct BookingCoordinator<D> {
    db: D,
    clock: Arc<dyn Clock>,
    notifications: NotificationDispatcher,
}

impl<D> BookingCoordinator<D> {
    /// Create a coordinator.
    pub fn new(db: D, clock: Arc<dyn Clock>, notifications: NotificationDispatcher) -> Self {
        Self {
            db,
            clock,
            notifications,
        }
    }
}

impl<D: HospitalStore> BookingCoordinator<D> {
    /// Book an appointment on the normal or emergency path.
    ///
    /// # Errors
    ///
    /// - `Validation` for a normal booking without slot or date, a date other
    ///   than the slot's own, an emergency without professional, or a
    ///   professional that does not own the slot
    /// - `NotFound` for an unknown patient, professional or slot
    /// - `Conflict` when the slot is unavailable or already booked for the date
    #[tracing::instrument(skip(self, cmd), fields(patient_id = %cmd.patient_id, priority = %cmd.priority))]
    pub async fn book(&self, cmd: BookAppointment) -> Result<Appointment> {
        match cmd.priority {
            Priority::Normal => self.book_slot(cmd).await,
            Priority::Emergency => self.book_emergency(cmd).await,
        }
    }

    async fn book_slot(&self, cmd: BookAppointment) -> Result<Appointment> {
        let slot_id = cmd
            .slot_id
            .ok_or_else(|| HospitalError::validation("slot_id is required for normal bookings"))?;
        let date = cmd
            .date
            .ok_or_else(|| HospitalError::validation("date is required for normal bookings"))?;

        let mut tx = self.db.begin().await?;
        let outcome: Result<Appointment> = async {
            tx.patient(cmd.patient_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("patient", cmd.patient_id))?;

            let slot = tx
                .slot(slot_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("slot", slot_id))?;
            if date != slot.date {
                return Err(HospitalError::validation(format!(
                    "slot {slot_id} is published for {}, not {date}",
                    slot.date
                )));
            }
            if cmd.hcp_id.is_some_and(|hcp| hcp != slot.hcp_id) {
                return Err(HospitalError::validation(format!(
                    "slot {slot_id} belongs to professional {}",
                    slot.hcp_id
                )));
            }
            if !slot.available {
                metrics::record_booking_conflict("slot_unavailable");
                return Err(HospitalError::conflict(format!("slot {slot_id} is not available")));
            }
            if tx.booking_on(slot_id, date).await?.is_some() {
                metrics::record_booking_conflict("already_booked");
                return Err(HospitalError::conflict(format!(
                    "slot {slot_id} is already booked for {date}"
                )));
            }

            let appointment = tx
                .insert_appointment(&NewAppointment {
                    patient_id: cmd.patient_id,
                    hcp_id: slot.hcp_id,
                    date_time: date.and_time(slot.start).and_utc(),
                    priority: Priority::Normal,
                    notes: cmd.notes,
                })
                .await?;

            bind_slot(&mut tx, &slot, date, appointment.id)
                .await
                .inspect_err(|err| {
                    if err.is_conflict() {
                        metrics::record_booking_conflict("race");
                    }
                })?;
            Ok(appointment)
        }
        .await;

        let appointment = settle(tx, outcome).await?;
        metrics::record_booking(Priority::Normal);
        tracing::info!(appointment_id = %appointment.id, %slot_id, %date, "Appointment booked");
        Ok(appointment)
    }

    async fn book_emergency(&self, cmd: BookAppointment) -> Result<Appointment> {
        let hcp_id = cmd
            .hcp_id
            .ok_or_else(|| HospitalError::validation("hcp_id is required for emergency bookings"))?;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let outcome: Result<Appointment> = async {
            tx.patient(cmd.patient_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("patient", cmd.patient_id))?;
            tx.hcp(hcp_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("health care professional", hcp_id))?;

            Ok(tx
                .insert_appointment(&NewAppointment {
                    patient_id: cmd.patient_id,
                    hcp_id,
                    date_time: now,
                    priority: Priority::Emergency,
                    notes: cmd.notes,
                })
                .await?)
        }
        .await;

        let appointment = settle(tx, outcome).await?;
        metrics::record_booking(Priority::Emergency);
        tracing::warn!(appointment_id = %appointment.id, %hcp_id, "Emergency appointment booked");

        self.notifications.fire_and_forget(Notification::EmergencyAppointment {
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            hcp_id,
            at: appointment.date_time,
            notes: appointment.notes.clone(),
        });
        Ok(appointment)
    }

    /// Move an appointment to `status`.
    ///
    /// Completed, Cancelled, Rescheduled and No-show free the slot, but only
    /// when the appointment still held it: a slot freed once may already be
    /// claimed by another booking. Only Cancelled also deletes the booking, so
    /// a slot freed by any other status still cannot be rebooked for the same
    /// date.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown appointment.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        appointment_id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<Appointment> = async {
            let mut appointment = tx
                .appointment_for_update(appointment_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("appointment", appointment_id))?;

            let held = !appointment.status.releases_slot();
            let cancelled = status == AppointmentStatus::Cancelled;

            tx.set_appointment_status(appointment_id, status).await?;
            if status.releases_slot() && (held || cancelled) {
                release_slot(&mut tx, appointment_id, held, cancelled).await?;
            }
            appointment.status = status;
            Ok(appointment)
        }
        .await;

        let appointment = settle(tx, outcome).await?;
        tracing::info!(status = %status, "Appointment status updated");
        Ok(appointment)
    }

    /// One appointment.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown appointment.
    pub async fn appointment(&self, appointment_id: AppointmentId) -> Result<Appointment> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<Appointment> = async {
            tx.appointment(appointment_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("appointment", appointment_id))
        }
        .await;
        settle(tx, outcome).await
    }

    /// Every appointment of a doctor, newest first.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown professional, `Forbidden` for a non-doctor.
    pub async fn appointments_for_doctor(&self, hcp_id: HcpId) -> Result<Vec<Appointment>> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<Vec<Appointment>> = async {
            let hcp = tx
                .hcp(hcp_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("health care professional", hcp_id))?;
            if hcp.designation != Designation::Doctor {
                return Err(HospitalError::forbidden(format!(
                    "{} is not a doctor",
                    hcp.name
                )));
            }
            Ok(tx.appointments_of_hcp(hcp_id).await?)
        }
        .await;
        settle(tx, outcome).await
    }

    /// Scheduled appointments of a patient, newest first.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown patient.
    pub async fn appointments_for_patient(&self, patient_id: PatientId) -> Result<Vec<Appointment>> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<Vec<Appointment>> = async {
            tx.patient(patient_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("patient", patient_id))?;
            Ok(tx.scheduled_appointments_of_patient(patient_id).await?)
        }
        .await;
        settle(tx, outcome).await
    }
}
