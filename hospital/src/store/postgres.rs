//! Hospital records over a Postgres transaction.
//!
//! Statements run on the transaction held by [`PgUnitOfWork`]. Row locks taken
//! by the `_for_update` reads last until the unit of work ends. Every driver
//! error goes through [`classify`] so constraint names survive.

use super::{ScheduleRecords, WardRecords};
use crate::occupancy::Occupancy;
use crate::types::{
    Admission, AdmissionId, AdmittedPatient, Amount, Appointment, AppointmentId,
    AppointmentStatus, Booking, BookingId, HcpId, HealthCareProfessional, NewAdmission,
    NewAppointment, NewBooking, NewRoom, NewSlot, Patient, PatientId, PaymentEntry, Room, RoomId,
    Slot, SlotId,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use medbay_core::storage::{StorageError, StorageResult};
use medbay_postgres::{PgUnitOfWork, classify};
use sqlx::types::Json;

// ============================================================================
// Rows
// ============================================================================

#[derive(sqlx::FromRow)]
struct PatientRow {
    id: i64,
    username: String,
    name: String,
    email: Option<String>,
}

impl From<PatientRow> for Patient {
    fn from(row: PatientRow) -> Self {
        Self {
            id: PatientId::new(row.id),
            username: row.username,
            name: row.name,
            email: row.email,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HcpRow {
    id: i64,
    name: String,
    email: Option<String>,
    designation: String,
}

impl TryFrom<HcpRow> for HealthCareProfessional {
    type Error = StorageError;

    fn try_from(row: HcpRow) -> StorageResult<Self> {
        Ok(Self {
            id: HcpId::new(row.id),
            name: row.name,
            email: row.email,
            designation: label(&row.designation)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: i64,
    room_number: String,
    room_type: String,
    daily_rate: i64,
    status: String,
    capacity: Option<i32>,
    current_occupancy: Option<i32>,
}

impl TryFrom<RoomRow> for Room {
    type Error = StorageError;

    fn try_from(row: RoomRow) -> StorageResult<Self> {
        let kind = label(&row.room_type)?;
        let status = label(&row.status)?;
        let occupancy = Occupancy::from_columns(kind, status, row.capacity, row.current_occupancy)
            .map_err(|e| StorageError::Corrupt(format!("room {}: {e}", row.id)))?;
        Ok(Self {
            id: RoomId::new(row.id),
            number: row.room_number,
            kind,
            daily_rate: Amount::from_units(row.daily_rate),
            occupancy,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AdmissionRow {
    id: i64,
    patient_id: i64,
    room_id: i64,
    admit_time: DateTime<Utc>,
    discharge_time: Option<DateTime<Utc>>,
    total_fee: i64,
    remaining_fee: i64,
    payments: Json<Vec<PaymentEntry>>,
}

impl From<AdmissionRow> for Admission {
    fn from(row: AdmissionRow) -> Self {
        Self {
            id: AdmissionId::new(row.id),
            patient_id: PatientId::new(row.patient_id),
            room_id: RoomId::new(row.room_id),
            admit_time: row.admit_time,
            discharge_time: row.discharge_time,
            total_fee: Amount::from_units(row.total_fee),
            remaining_fee: Amount::from_units(row.remaining_fee),
            payments: row.payments.0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AdmittedRow {
    #[sqlx(flatten)]
    admission: AdmissionRow,
    patient_name: String,
    room_number: String,
    room_status: String,
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    id: i64,
    hcp_id: i64,
    slot_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    is_available: bool,
}

impl From<SlotRow> for Slot {
    fn from(row: SlotRow) -> Self {
        Self {
            id: SlotId::new(row.id),
            hcp_id: HcpId::new(row.hcp_id),
            date: row.slot_date,
            start: row.start_time,
            end: row.end_time,
            available: row.is_available,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    slot_id: i64,
    booking_date: NaiveDate,
    appointment_id: i64,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Self {
            id: BookingId::new(row.id),
            slot_id: SlotId::new(row.slot_id),
            date: row.booking_date,
            appointment_id: AppointmentId::new(row.appointment_id),
        }
    }
}

#[derive(sqlx::FromRow)]
struct AppointmentRow {
    id: i64,
    patient_id: i64,
    hcp_id: i64,
    date_time: DateTime<Utc>,
    status: String,
    priority: String,
    notes: Option<String>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StorageError;

    fn try_from(row: AppointmentRow) -> StorageResult<Self> {
        Ok(Self {
            id: AppointmentId::new(row.id),
            patient_id: PatientId::new(row.patient_id),
            hcp_id: HcpId::new(row.hcp_id),
            date_time: row.date_time,
            status: label(&row.status)?,
            priority: label(&row.priority)?,
            notes: row.notes,
        })
    }
}

fn label<T>(text: &str) -> StorageResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text.parse().map_err(|e: T::Err| StorageError::Corrupt(e.to_string()))
}

fn decode_all<R, T>(rows: Vec<R>) -> StorageResult<Vec<T>>
where
    T: TryFrom<R, Error = StorageError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Column values for an occupancy: `(status, capacity, current_occupancy)`.
fn occupancy_columns(occupancy: Occupancy) -> StorageResult<(&'static str, Option<i32>, Option<i32>)> {
    let to_i32 = |n: Option<u32>| {
        n.map(i32::try_from)
            .transpose()
            .map_err(|e| StorageError::Corrupt(format!("occupancy out of range: {e}")))
    };
    Ok((
        occupancy.status().as_str(),
        to_i32(occupancy.capacity())?,
        to_i32(occupancy.occupied_count())?,
    ))
}

// ============================================================================
// Statements
// ============================================================================

const PATIENT_COLUMNS: &str = "id, username, name, email";
const HCP_COLUMNS: &str = "id, name, email, designation";
const ROOM_COLUMNS: &str =
    "id, room_number, room_type, daily_rate, status, capacity, current_occupancy";
const ADMISSION_COLUMNS: &str =
    "id, patient_id, room_id, admit_time, discharge_time, total_fee, remaining_fee, payments";
const SLOT_COLUMNS: &str = "id, hcp_id, slot_date, start_time, end_time, is_available";
const BOOKING_COLUMNS: &str = "id, slot_id, booking_date, appointment_id";
const APPOINTMENT_COLUMNS: &str = "id, patient_id, hcp_id, date_time, status, priority, notes";

impl WardRecords for PgUnitOfWork {
    async fn patient(&mut self, id: PatientId) -> StorageResult<Option<Patient>> {
        let row: Option<PatientRow> =
            sqlx::query_as(&format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1"))
                .bind(id.get())
                .fetch_optional(self.conn())
                .await
                .map_err(classify)?;
        Ok(row.map(Patient::from))
    }

    async fn patient_by_username(&mut self, username: &str) -> StorageResult<Option<Patient>> {
        let row: Option<PatientRow> =
            sqlx::query_as(&format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE username = $1"))
                .bind(username)
                .fetch_optional(self.conn())
                .await
                .map_err(classify)?;
        Ok(row.map(Patient::from))
    }

    async fn insert_room(&mut self, room: &NewRoom) -> StorageResult<Room> {
        let (status, capacity, occupied) = occupancy_columns(room.occupancy)?;
        let row: RoomRow = sqlx::query_as(&format!(
            "INSERT INTO rooms (room_number, room_type, daily_rate, status, capacity, current_occupancy)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ROOM_COLUMNS}"
        ))
        .bind(&room.number)
        .bind(room.kind.as_str())
        .bind(room.daily_rate.units())
        .bind(status)
        .bind(capacity)
        .bind(occupied)
        .fetch_one(self.conn())
        .await
        .map_err(classify)?;
        Room::try_from(row)
    }

    async fn room_for_update(&mut self, id: RoomId) -> StorageResult<Option<Room>> {
        let row: Option<RoomRow> =
            sqlx::query_as(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1 FOR UPDATE"))
                .bind(id.get())
                .fetch_optional(self.conn())
                .await
                .map_err(classify)?;
        row.map(Room::try_from).transpose()
    }

    async fn rooms(&mut self) -> StorageResult<Vec<Room>> {
        let rows: Vec<RoomRow> =
            sqlx::query_as(&format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY room_number"))
                .fetch_all(self.conn())
                .await
                .map_err(classify)?;
        decode_all(rows)
    }

    async fn save_room(&mut self, room: &Room) -> StorageResult<()> {
        let (status, capacity, occupied) = occupancy_columns(room.occupancy)?;
        sqlx::query(
            "UPDATE rooms
             SET room_number = $2, room_type = $3, daily_rate = $4,
                 status = $5, capacity = $6, current_occupancy = $7
             WHERE id = $1",
        )
        .bind(room.id.get())
        .bind(&room.number)
        .bind(room.kind.as_str())
        .bind(room.daily_rate.units())
        .bind(status)
        .bind(capacity)
        .bind(occupied)
        .execute(self.conn())
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn set_occupancy(&mut self, id: RoomId, occupancy: Occupancy) -> StorageResult<()> {
        let (status, _, occupied) = occupancy_columns(occupancy)?;
        sqlx::query("UPDATE rooms SET status = $2, current_occupancy = $3 WHERE id = $1")
            .bind(id.get())
            .bind(status)
            .bind(occupied)
            .execute(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_room(&mut self, id: RoomId) -> StorageResult<()> {
        sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id.get())
            .execute(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn room_has_admissions(&mut self, id: RoomId) -> StorageResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM admissions WHERE room_id = $1)")
            .bind(id.get())
            .fetch_one(self.conn())
            .await
            .map_err(classify)
    }

    async fn insert_admission(&mut self, admission: &NewAdmission) -> StorageResult<Admission> {
        let row: AdmissionRow = sqlx::query_as(&format!(
            "INSERT INTO admissions (patient_id, room_id, admit_time, total_fee, remaining_fee, payments)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ADMISSION_COLUMNS}"
        ))
        .bind(admission.patient_id.get())
        .bind(admission.room_id.get())
        .bind(admission.admit_time)
        .bind(admission.total_fee.units())
        .bind(admission.remaining_fee.units())
        .bind(Json(&admission.payments))
        .fetch_one(self.conn())
        .await
        .map_err(classify)?;
        Ok(row.into())
    }

    async fn admission_for_update(&mut self, id: AdmissionId) -> StorageResult<Option<Admission>> {
        let row: Option<AdmissionRow> = sqlx::query_as(&format!(
            "SELECT {ADMISSION_COLUMNS} FROM admissions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(self.conn())
        .await
        .map_err(classify)?;
        Ok(row.map(Admission::from))
    }

    async fn open_admission_of(&mut self, patient: PatientId) -> StorageResult<Option<AdmissionId>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM admissions WHERE patient_id = $1 AND discharge_time IS NULL",
        )
        .bind(patient.get())
        .fetch_optional(self.conn())
        .await
        .map_err(classify)?;
        Ok(id.map(AdmissionId::new))
    }

    async fn append_payment(&mut self, id: AdmissionId, entry: &PaymentEntry) -> StorageResult<()> {
        sqlx::query("UPDATE admissions SET payments = payments || $2 WHERE id = $1")
            .bind(id.get())
            .bind(Json([entry]))
            .execute(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn set_fees(
        &mut self,
        id: AdmissionId,
        total_fee: Amount,
        remaining_fee: Amount,
    ) -> StorageResult<()> {
        sqlx::query("UPDATE admissions SET total_fee = $2, remaining_fee = $3 WHERE id = $1")
            .bind(id.get())
            .bind(total_fee.units())
            .bind(remaining_fee.units())
            .execute(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn close_admission(&mut self, id: AdmissionId, at: DateTime<Utc>) -> StorageResult<()> {
        sqlx::query("UPDATE admissions SET discharge_time = $2 WHERE id = $1")
            .bind(id.get())
            .bind(at)
            .execute(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn open_admissions(&mut self) -> StorageResult<Vec<AdmittedPatient>> {
        let rows: Vec<AdmittedRow> = sqlx::query_as(
            "SELECT a.id, a.patient_id, a.room_id, a.admit_time, a.discharge_time,
                    a.total_fee, a.remaining_fee, a.payments,
                    p.username AS patient_name, r.room_number, r.status AS room_status
             FROM admissions a
             JOIN patients p ON p.id = a.patient_id
             JOIN rooms r ON r.id = a.room_id
             WHERE a.discharge_time IS NULL
             ORDER BY a.admit_time DESC, a.id DESC",
        )
        .fetch_all(self.conn())
        .await
        .map_err(classify)?;

        rows.into_iter()
            .map(|row| {
                Ok(AdmittedPatient {
                    room_status: label(&row.room_status)?,
                    admission: row.admission.into(),
                    patient_name: row.patient_name,
                    room_number: row.room_number,
                })
            })
            .collect()
    }
}

impl ScheduleRecords for PgUnitOfWork {
    async fn hcp(&mut self, id: HcpId) -> StorageResult<Option<HealthCareProfessional>> {
        let row: Option<HcpRow> = sqlx::query_as(&format!(
            "SELECT {HCP_COLUMNS} FROM health_care_professionals WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(self.conn())
        .await
        .map_err(classify)?;
        row.map(HealthCareProfessional::try_from).transpose()
    }

    async fn lock_hcp(&mut self, id: HcpId) -> StorageResult<Option<HealthCareProfessional>> {
        let row: Option<HcpRow> = sqlx::query_as(&format!(
            "SELECT {HCP_COLUMNS} FROM health_care_professionals WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(self.conn())
        .await
        .map_err(classify)?;
        row.map(HealthCareProfessional::try_from).transpose()
    }

    async fn slots_on(&mut self, hcp: HcpId, date: NaiveDate) -> StorageResult<Vec<Slot>> {
        let rows: Vec<SlotRow> = sqlx::query_as(&format!(
            "SELECT {SLOT_COLUMNS} FROM doctor_slots
             WHERE hcp_id = $1 AND slot_date = $2
             ORDER BY start_time"
        ))
        .bind(hcp.get())
        .bind(date)
        .fetch_all(self.conn())
        .await
        .map_err(classify)?;
        Ok(rows.into_iter().map(Slot::from).collect())
    }

    async fn insert_slot(&mut self, slot: &NewSlot) -> StorageResult<Slot> {
        let row: SlotRow = sqlx::query_as(&format!(
            "INSERT INTO doctor_slots (hcp_id, slot_date, start_time, end_time)
             VALUES ($1, $2, $3, $4)
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot.hcp_id.get())
        .bind(slot.date)
        .bind(slot.start)
        .bind(slot.end)
        .fetch_one(self.conn())
        .await
        .map_err(classify)?;
        Ok(row.into())
    }

    async fn insert_slot_if_absent(&mut self, slot: &NewSlot) -> StorageResult<Option<Slot>> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            "INSERT INTO doctor_slots (hcp_id, slot_date, start_time, end_time)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT ON CONSTRAINT doctor_slots_hcp_date_start_key DO NOTHING
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot.hcp_id.get())
        .bind(slot.date)
        .bind(slot.start)
        .bind(slot.end)
        .fetch_optional(self.conn())
        .await
        .map_err(classify)?;
        Ok(row.map(Slot::from))
    }

    async fn slot(&mut self, id: SlotId) -> StorageResult<Option<Slot>> {
        let row: Option<SlotRow> =
            sqlx::query_as(&format!("SELECT {SLOT_COLUMNS} FROM doctor_slots WHERE id = $1"))
                .bind(id.get())
                .fetch_optional(self.conn())
                .await
                .map_err(classify)?;
        Ok(row.map(Slot::from))
    }

    async fn claim_slot(&mut self, id: SlotId) -> StorageResult<bool> {
        let claimed = sqlx::query(
            "UPDATE doctor_slots SET is_available = FALSE WHERE id = $1 AND is_available",
        )
        .bind(id.get())
        .execute(self.conn())
        .await
        .map_err(classify)?;
        Ok(claimed.rows_affected() == 1)
    }

    async fn free_slot(&mut self, id: SlotId) -> StorageResult<()> {
        sqlx::query("UPDATE doctor_slots SET is_available = TRUE WHERE id = $1")
            .bind(id.get())
            .execute(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_slot(&mut self, id: SlotId) -> StorageResult<()> {
        sqlx::query("DELETE FROM doctor_slots WHERE id = $1")
            .bind(id.get())
            .execute(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn slot_has_bookings(&mut self, id: SlotId) -> StorageResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM bookings WHERE slot_id = $1)")
            .bind(id.get())
            .fetch_one(self.conn())
            .await
            .map_err(classify)
    }

    async fn open_slots_on(&mut self, hcp: HcpId, date: NaiveDate) -> StorageResult<Vec<Slot>> {
        let rows: Vec<SlotRow> = sqlx::query_as(&format!(
            "SELECT {SLOT_COLUMNS} FROM doctor_slots s
             WHERE s.hcp_id = $1 AND s.slot_date = $2 AND s.is_available
               AND NOT EXISTS (
                   SELECT 1 FROM bookings b WHERE b.slot_id = s.id AND b.booking_date = $2
               )
             ORDER BY s.start_time"
        ))
        .bind(hcp.get())
        .bind(date)
        .fetch_all(self.conn())
        .await
        .map_err(classify)?;
        Ok(rows.into_iter().map(Slot::from).collect())
    }

    async fn open_slots_after(&mut self, hcp: HcpId, after: NaiveDate) -> StorageResult<Vec<Slot>> {
        let rows: Vec<SlotRow> = sqlx::query_as(&format!(
            "SELECT {SLOT_COLUMNS} FROM doctor_slots s
             WHERE s.hcp_id = $1 AND s.slot_date > $2 AND s.is_available
               AND NOT EXISTS (
                   SELECT 1 FROM bookings b WHERE b.slot_id = s.id AND b.booking_date = s.slot_date
               )
             ORDER BY s.slot_date, s.start_time"
        ))
        .bind(hcp.get())
        .bind(after)
        .fetch_all(self.conn())
        .await
        .map_err(classify)?;
        Ok(rows.into_iter().map(Slot::from).collect())
    }

    async fn booking_on(&mut self, slot: SlotId, date: NaiveDate) -> StorageResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE slot_id = $1 AND booking_date = $2"
        ))
        .bind(slot.get())
        .bind(date)
        .fetch_optional(self.conn())
        .await
        .map_err(classify)?;
        Ok(row.map(Booking::from))
    }

    async fn booking_of(&mut self, appointment: AppointmentId) -> StorageResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE appointment_id = $1"
        ))
        .bind(appointment.get())
        .fetch_optional(self.conn())
        .await
        .map_err(classify)?;
        Ok(row.map(Booking::from))
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> StorageResult<Booking> {
        let row: BookingRow = sqlx::query_as(&format!(
            "INSERT INTO bookings (slot_id, booking_date, appointment_id)
             VALUES ($1, $2, $3)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.slot_id.get())
        .bind(booking.date)
        .bind(booking.appointment_id.get())
        .fetch_one(self.conn())
        .await
        .map_err(classify)?;
        Ok(row.into())
    }

    async fn delete_booking(&mut self, id: BookingId) -> StorageResult<()> {
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id.get())
            .execute(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn insert_appointment(&mut self, appointment: &NewAppointment) -> StorageResult<Appointment> {
        let row: AppointmentRow = sqlx::query_as(&format!(
            "INSERT INTO appointments (patient_id, hcp_id, date_time, status, priority, notes)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(appointment.patient_id.get())
        .bind(appointment.hcp_id.get())
        .bind(appointment.date_time)
        .bind(AppointmentStatus::Scheduled.as_str())
        .bind(appointment.priority.as_str())
        .bind(appointment.notes.as_deref())
        .fetch_one(self.conn())
        .await
        .map_err(classify)?;
        Appointment::try_from(row)
    }

    async fn appointment(&mut self, id: AppointmentId) -> StorageResult<Option<Appointment>> {
        let row: Option<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(self.conn())
        .await
        .map_err(classify)?;
        row.map(Appointment::try_from).transpose()
    }

    async fn appointment_for_update(&mut self, id: AppointmentId) -> StorageResult<Option<Appointment>> {
        let row: Option<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(self.conn())
        .await
        .map_err(classify)?;
        row.map(Appointment::try_from).transpose()
    }

    async fn set_appointment_status(
        &mut self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> StorageResult<()> {
        sqlx::query("UPDATE appointments SET status = $2 WHERE id = $1")
            .bind(id.get())
            .bind(status.as_str())
            .execute(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn appointments_of_hcp(&mut self, hcp: HcpId) -> StorageResult<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE hcp_id = $1
             ORDER BY date_time DESC, id DESC"
        ))
        .bind(hcp.get())
        .fetch_all(self.conn())
        .await
        .map_err(classify)?;
        decode_all(rows)
    }

    async fn scheduled_appointments_of_patient(
        &mut self,
        patient: PatientId,
    ) -> StorageResult<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE patient_id = $1 AND status = 'Scheduled'
             ORDER BY date_time DESC, id DESC"
        ))
        .bind(patient.get())
        .fetch_all(self.conn())
        .await
        .map_err(classify)?;
        decode_all(rows)
    }

    async fn scheduled_between(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE status = 'Scheduled' AND date_time >= $1 AND date_time < $2
             ORDER BY date_time, id"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(self.conn())
        .await
        .map_err(classify)?;
        decode_all(rows)
    }
}
