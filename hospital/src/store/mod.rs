//! Record access for the hospital engines.
//!
//! The engines never talk to a backend directly. They open a unit of work on a
//! [`HospitalStore`] and call the record traits on it:
//!
//! - [`WardRecords`]: patients, rooms, admissions, payments
//! - [`ScheduleRecords`]: professionals, slots, bookings, appointments
//!
//! Methods suffixed `_for_update` lock the row until the unit of work ends.
//! Uniqueness rules named in [`constraints`] are enforced by every backend and
//! surface as [`StorageError::UniqueViolation`](medbay_core::storage::StorageError).

use crate::occupancy::Occupancy;
use crate::types::{
    Admission, AdmissionId, AdmittedPatient, Amount, Appointment, AppointmentId,
    AppointmentStatus, Booking, BookingId, HcpId, HealthCareProfessional, NewAdmission,
    NewAppointment, NewBooking, NewRoom, NewSlot, Patient, PatientId, PaymentEntry, Room, RoomId,
    Slot, SlotId,
};
use chrono::{DateTime, NaiveDate, Utc};
use medbay_core::storage::{Database, StorageResult};
use std::future::Future;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;

/// Names of the storage rules, shared by the migrations and both backends.
pub mod constraints {
    /// Room numbers are unique.
    pub const ROOM_NUMBER: &str = "rooms_room_number_key";
    /// Occupancy shape and bounds per room kind.
    pub const ROOM_OCCUPANCY: &str = "rooms_occupancy_shape";
    /// At most one open admission per patient.
    pub const ONE_OPEN_ADMISSION: &str = "admissions_one_open_per_patient";
    /// Admissions reference their room.
    pub const ADMISSION_ROOM: &str = "admissions_room_id_fkey";
    /// One slot per professional, date and start time.
    pub const SLOT_START: &str = "doctor_slots_hcp_date_start_key";
    /// One booking per slot and date.
    pub const BOOKING_SLOT_DATE: &str = "bookings_slot_date_key";
    /// One booking per appointment.
    pub const BOOKING_APPOINTMENT: &str = "bookings_appointment_id_key";
    /// Bookings reference their slot.
    pub const BOOKING_SLOT: &str = "bookings_slot_id_fkey";
}

/// Patients, rooms and admissions.
pub trait WardRecords: Send {
    /// Patient by id.
    fn patient(&mut self, id: PatientId) -> impl Future<Output = StorageResult<Option<Patient>>> + Send;

    /// Patient by login name.
    fn patient_by_username(
        &mut self,
        username: &str,
    ) -> impl Future<Output = StorageResult<Option<Patient>>> + Send;

    /// Create a room.
    fn insert_room(&mut self, room: &NewRoom) -> impl Future<Output = StorageResult<Room>> + Send;

    /// Room by id, locked.
    fn room_for_update(&mut self, id: RoomId) -> impl Future<Output = StorageResult<Option<Room>>> + Send;

    /// All rooms ordered by room number.
    fn rooms(&mut self) -> impl Future<Output = StorageResult<Vec<Room>>> + Send;

    /// Overwrite a room's number, kind, rate and occupancy.
    fn save_room(&mut self, room: &Room) -> impl Future<Output = StorageResult<()>> + Send;

    /// Persist a new occupancy for a room.
    fn set_occupancy(
        &mut self,
        id: RoomId,
        occupancy: Occupancy,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Remove a room.
    fn delete_room(&mut self, id: RoomId) -> impl Future<Output = StorageResult<()>> + Send;

    /// Whether any admission, open or closed, references the room.
    fn room_has_admissions(&mut self, id: RoomId) -> impl Future<Output = StorageResult<bool>> + Send;

    /// Create an admission with its initial payments.
    fn insert_admission(
        &mut self,
        admission: &NewAdmission,
    ) -> impl Future<Output = StorageResult<Admission>> + Send;

    /// Admission by id with its ledger, locked.
    fn admission_for_update(
        &mut self,
        id: AdmissionId,
    ) -> impl Future<Output = StorageResult<Option<Admission>>> + Send;

    /// The patient's open admission, if any.
    fn open_admission_of(
        &mut self,
        patient: PatientId,
    ) -> impl Future<Output = StorageResult<Option<AdmissionId>>> + Send;

    /// Append to an admission's payment ledger.
    fn append_payment(
        &mut self,
        id: AdmissionId,
        entry: &PaymentEntry,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Overwrite an admission's fee totals.
    fn set_fees(
        &mut self,
        id: AdmissionId,
        total_fee: Amount,
        remaining_fee: Amount,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Close an admission.
    fn close_admission(
        &mut self,
        id: AdmissionId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Open admissions with patient and room details, newest first.
    fn open_admissions(&mut self) -> impl Future<Output = StorageResult<Vec<AdmittedPatient>>> + Send;
}

/// Professionals, slots, bookings and appointments.
pub trait ScheduleRecords: Send {
    /// Professional by id.
    fn hcp(
        &mut self,
        id: HcpId,
    ) -> impl Future<Output = StorageResult<Option<HealthCareProfessional>>> + Send;

    /// Professional by id, locked so that slot creation for one professional is serialized.
    fn lock_hcp(
        &mut self,
        id: HcpId,
    ) -> impl Future<Output = StorageResult<Option<HealthCareProfessional>>> + Send;

    /// All slots of a professional on a date, ordered by start.
    fn slots_on(
        &mut self,
        hcp: HcpId,
        date: NaiveDate,
    ) -> impl Future<Output = StorageResult<Vec<Slot>>> + Send;

    /// Create a slot.
    fn insert_slot(&mut self, slot: &NewSlot) -> impl Future<Output = StorageResult<Slot>> + Send;

    /// Create a slot unless one already starts at the same time; `None` when skipped.
    fn insert_slot_if_absent(
        &mut self,
        slot: &NewSlot,
    ) -> impl Future<Output = StorageResult<Option<Slot>>> + Send;

    /// Slot by id.
    fn slot(&mut self, id: SlotId) -> impl Future<Output = StorageResult<Option<Slot>>> + Send;

    /// Mark an available slot unavailable; `false` if it was not available.
    fn claim_slot(&mut self, id: SlotId) -> impl Future<Output = StorageResult<bool>> + Send;

    /// Mark a slot available again.
    fn free_slot(&mut self, id: SlotId) -> impl Future<Output = StorageResult<()>> + Send;

    /// Remove a slot.
    fn delete_slot(&mut self, id: SlotId) -> impl Future<Output = StorageResult<()>> + Send;

    /// Whether any booking references the slot.
    fn slot_has_bookings(&mut self, id: SlotId) -> impl Future<Output = StorageResult<bool>> + Send;

    /// Available slots of a professional on a date without a booking for that date.
    fn open_slots_on(
        &mut self,
        hcp: HcpId,
        date: NaiveDate,
    ) -> impl Future<Output = StorageResult<Vec<Slot>>> + Send;

    /// Available, unbooked slots of a professional dated after `after`, by date then start.
    fn open_slots_after(
        &mut self,
        hcp: HcpId,
        after: NaiveDate,
    ) -> impl Future<Output = StorageResult<Vec<Slot>>> + Send;

    /// Booking of a slot on a date.
    fn booking_on(
        &mut self,
        slot: SlotId,
        date: NaiveDate,
    ) -> impl Future<Output = StorageResult<Option<Booking>>> + Send;

    /// Booking held by an appointment.
    fn booking_of(
        &mut self,
        appointment: AppointmentId,
    ) -> impl Future<Output = StorageResult<Option<Booking>>> + Send;

    /// Create a booking.
    fn insert_booking(
        &mut self,
        booking: &NewBooking,
    ) -> impl Future<Output = StorageResult<Booking>> + Send;

    /// Remove a booking.
    fn delete_booking(&mut self, id: BookingId) -> impl Future<Output = StorageResult<()>> + Send;

    /// Create a `Scheduled` appointment.
    fn insert_appointment(
        &mut self,
        appointment: &NewAppointment,
    ) -> impl Future<Output = StorageResult<Appointment>> + Send;

    /// Appointment by id.
    fn appointment(
        &mut self,
        id: AppointmentId,
    ) -> impl Future<Output = StorageResult<Option<Appointment>>> + Send;

    /// Appointment by id, locked.
    fn appointment_for_update(
        &mut self,
        id: AppointmentId,
    ) -> impl Future<Output = StorageResult<Option<Appointment>>> + Send;

    /// Change an appointment's status.
    fn set_appointment_status(
        &mut self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// All appointments of a professional, newest first.
    fn appointments_of_hcp(
        &mut self,
        hcp: HcpId,
    ) -> impl Future<Output = StorageResult<Vec<Appointment>>> + Send;

    /// Scheduled appointments of a patient, newest first.
    fn scheduled_appointments_of_patient(
        &mut self,
        patient: PatientId,
    ) -> impl Future<Output = StorageResult<Vec<Appointment>>> + Send;

    /// Scheduled appointments with `from <= date_time < to`.
    fn scheduled_between(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = StorageResult<Vec<Appointment>>> + Send;
}

/// A database whose units of work expose every hospital record trait.
pub trait HospitalStore: Database<Tx: WardRecords + ScheduleRecords> {}

impl<D> HospitalStore for D
where
    D: Database,
    D::Tx: WardRecords + ScheduleRecords,
{
}
