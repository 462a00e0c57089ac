//! In-process store for tests and the demo server.
//!
//! One mutex guards every table. A unit of work holds the lock from `begin`
//! until it ends and works on a private copy, which `commit` writes back. Units
//! of work are therefore fully serialized, and the uniqueness and reference
//! rules from [`constraints`](super::constraints) are checked on every write
//! the same way the Postgres schema checks them.

use super::{ScheduleRecords, WardRecords, constraints};
use crate::occupancy::Occupancy;
use crate::types::{
    Admission, AdmissionId, AdmittedPatient, Amount, Appointment, AppointmentId,
    AppointmentStatus, Booking, BookingId, Designation, HcpId, HealthCareProfessional,
    NewAdmission, NewAppointment, NewBooking, NewRoom, NewSlot, Patient, PatientId, PaymentEntry,
    Room, RoomId, Slot, SlotId,
};
use chrono::{DateTime, NaiveDate, Utc};
use medbay_core::storage::{Database, StorageError, StorageResult, UnitOfWork};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
struct Sequences {
    patient: i64,
    hcp: i64,
    room: i64,
    admission: i64,
    slot: i64,
    booking: i64,
    appointment: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Clone, Debug, Default)]
struct Tables {
    seq: Sequences,
    patients: BTreeMap<PatientId, Patient>,
    hcps: BTreeMap<HcpId, HealthCareProfessional>,
    rooms: BTreeMap<RoomId, Room>,
    admissions: BTreeMap<AdmissionId, Admission>,
    slots: BTreeMap<SlotId, Slot>,
    bookings: BTreeMap<BookingId, Booking>,
    appointments: BTreeMap<AppointmentId, Appointment>,
}

fn unique(constraint: &str) -> StorageError {
    StorageError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

fn foreign_key(constraint: &str) -> StorageError {
    StorageError::ForeignKeyViolation {
        constraint: constraint.to_string(),
    }
}

/// Shared in-memory tables.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a patient in the directory.
    pub async fn seed_patient(&self, username: &str, name: &str) -> Patient {
        let mut tables = self.tables.lock().await;
        let patient = Patient {
            id: PatientId::new(next(&mut tables.seq.patient)),
            username: username.to_string(),
            name: name.to_string(),
            email: Some(format!("{username}@patients.local")),
        };
        tables.patients.insert(patient.id, patient.clone());
        patient
    }

    /// Register a health-care professional in the directory.
    pub async fn seed_hcp(&self, name: &str, designation: Designation) -> HealthCareProfessional {
        let mut tables = self.tables.lock().await;
        let hcp = HealthCareProfessional {
            id: HcpId::new(next(&mut tables.seq.hcp)),
            name: name.to_string(),
            email: None,
            designation,
        };
        tables.hcps.insert(hcp.id, hcp.clone());
        hcp
    }
}

impl Database for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> StorageResult<InMemoryTx> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTx { guard, working })
    }
}

/// A unit of work over [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl UnitOfWork for InMemoryTx {
    async fn commit(mut self) -> StorageResult<()> {
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> StorageResult<()> {
        Ok(())
    }
}

impl InMemoryTx {
    fn slot_booked_on(&self, slot: SlotId, date: NaiveDate) -> bool {
        self.working
            .bookings
            .values()
            .any(|b| b.slot_id == slot && b.date == date)
    }

    fn open_slots(&self, hcp: HcpId, keep: impl Fn(&Slot) -> bool) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self
            .working
            .slots
            .values()
            .filter(|s| s.hcp_id == hcp && s.available && keep(s))
            .filter(|s| !self.slot_booked_on(s.id, s.date))
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.date, s.start));
        slots
    }

    fn appointments_where(&self, keep: impl Fn(&Appointment) -> bool) -> Vec<Appointment> {
        let mut found: Vec<Appointment> = self
            .working
            .appointments
            .values()
            .filter(|a| keep(a))
            .cloned()
            .collect();
        found.sort_by_key(|a| Reverse((a.date_time, a.id)));
        found
    }
}

impl WardRecords for InMemoryTx {
    async fn patient(&mut self, id: PatientId) -> StorageResult<Option<Patient>> {
        Ok(self.working.patients.get(&id).cloned())
    }

    async fn patient_by_username(&mut self, username: &str) -> StorageResult<Option<Patient>> {
        Ok(self
            .working
            .patients
            .values()
            .find(|p| p.username == username)
            .cloned())
    }

    async fn insert_room(&mut self, room: &NewRoom) -> StorageResult<Room> {
        if self.working.rooms.values().any(|r| r.number == room.number) {
            return Err(unique(constraints::ROOM_NUMBER));
        }
        let created = Room {
            id: RoomId::new(next(&mut self.working.seq.room)),
            number: room.number.clone(),
            kind: room.kind,
            daily_rate: room.daily_rate,
            occupancy: room.occupancy,
        };
        self.working.rooms.insert(created.id, created.clone());
        Ok(created)
    }

    async fn room_for_update(&mut self, id: RoomId) -> StorageResult<Option<Room>> {
        Ok(self.working.rooms.get(&id).cloned())
    }

    async fn rooms(&mut self) -> StorageResult<Vec<Room>> {
        let mut rooms: Vec<Room> = self.working.rooms.values().cloned().collect();
        rooms.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(rooms)
    }

    async fn save_room(&mut self, room: &Room) -> StorageResult<()> {
        if self
            .working
            .rooms
            .values()
            .any(|r| r.id != room.id && r.number == room.number)
        {
            return Err(unique(constraints::ROOM_NUMBER));
        }
        if let Some(stored) = self.working.rooms.get_mut(&room.id) {
            *stored = room.clone();
        }
        Ok(())
    }

    async fn set_occupancy(&mut self, id: RoomId, occupancy: Occupancy) -> StorageResult<()> {
        if let Some(room) = self.working.rooms.get_mut(&id) {
            room.occupancy = occupancy;
        }
        Ok(())
    }

    async fn delete_room(&mut self, id: RoomId) -> StorageResult<()> {
        if self.working.admissions.values().any(|a| a.room_id == id) {
            return Err(foreign_key(constraints::ADMISSION_ROOM));
        }
        self.working.rooms.remove(&id);
        Ok(())
    }

    async fn room_has_admissions(&mut self, id: RoomId) -> StorageResult<bool> {
        Ok(self.working.admissions.values().any(|a| a.room_id == id))
    }

    async fn insert_admission(&mut self, admission: &NewAdmission) -> StorageResult<Admission> {
        if !self.working.rooms.contains_key(&admission.room_id) {
            return Err(foreign_key(constraints::ADMISSION_ROOM));
        }
        if self
            .working
            .admissions
            .values()
            .any(|a| a.patient_id == admission.patient_id && a.is_open())
        {
            return Err(unique(constraints::ONE_OPEN_ADMISSION));
        }
        let created = Admission {
            id: AdmissionId::new(next(&mut self.working.seq.admission)),
            patient_id: admission.patient_id,
            room_id: admission.room_id,
            admit_time: admission.admit_time,
            discharge_time: None,
            total_fee: admission.total_fee,
            remaining_fee: admission.remaining_fee,
            payments: admission.payments.clone(),
        };
        self.working.admissions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn admission_for_update(&mut self, id: AdmissionId) -> StorageResult<Option<Admission>> {
        Ok(self.working.admissions.get(&id).cloned())
    }

    async fn open_admission_of(&mut self, patient: PatientId) -> StorageResult<Option<AdmissionId>> {
        Ok(self
            .working
            .admissions
            .values()
            .find(|a| a.patient_id == patient && a.is_open())
            .map(|a| a.id))
    }

    async fn append_payment(&mut self, id: AdmissionId, entry: &PaymentEntry) -> StorageResult<()> {
        if let Some(admission) = self.working.admissions.get_mut(&id) {
            admission.payments.push(entry.clone());
        }
        Ok(())
    }

    async fn set_fees(
        &mut self,
        id: AdmissionId,
        total_fee: Amount,
        remaining_fee: Amount,
    ) -> StorageResult<()> {
        if let Some(admission) = self.working.admissions.get_mut(&id) {
            admission.total_fee = total_fee;
            admission.remaining_fee = remaining_fee;
        }
        Ok(())
    }

    async fn close_admission(&mut self, id: AdmissionId, at: DateTime<Utc>) -> StorageResult<()> {
        if let Some(admission) = self.working.admissions.get_mut(&id) {
            admission.discharge_time = Some(at);
        }
        Ok(())
    }

    async fn open_admissions(&mut self) -> StorageResult<Vec<AdmittedPatient>> {
        let tables = &self.working;
        let mut admitted: Vec<AdmittedPatient> = tables
            .admissions
            .values()
            .filter(|a| a.is_open())
            .filter_map(|a| {
                let patient = tables.patients.get(&a.patient_id)?;
                let room = tables.rooms.get(&a.room_id)?;
                Some(AdmittedPatient {
                    admission: a.clone(),
                    patient_name: patient.username.clone(),
                    room_number: room.number.clone(),
                    room_status: room.status(),
                })
            })
            .collect();
        admitted.sort_by_key(|p| Reverse((p.admission.admit_time, p.admission.id)));
        Ok(admitted)
    }
}

impl ScheduleRecords for InMemoryTx {
    async fn hcp(&mut self, id: HcpId) -> StorageResult<Option<HealthCareProfessional>> {
        Ok(self.working.hcps.get(&id).cloned())
    }

    async fn lock_hcp(&mut self, id: HcpId) -> StorageResult<Option<HealthCareProfessional>> {
        Ok(self.working.hcps.get(&id).cloned())
    }

    async fn slots_on(&mut self, hcp: HcpId, date: NaiveDate) -> StorageResult<Vec<Slot>> {
        let mut slots: Vec<Slot> = self
            .working
            .slots
            .values()
            .filter(|s| s.hcp_id == hcp && s.date == date)
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.start);
        Ok(slots)
    }

    async fn insert_slot(&mut self, slot: &NewSlot) -> StorageResult<Slot> {
        self.insert_slot_if_absent(slot)
            .await?
            .ok_or_else(|| unique(constraints::SLOT_START))
    }

    async fn insert_slot_if_absent(&mut self, slot: &NewSlot) -> StorageResult<Option<Slot>> {
        if self
            .working
            .slots
            .values()
            .any(|s| s.hcp_id == slot.hcp_id && s.date == slot.date && s.start == slot.start)
        {
            return Ok(None);
        }
        let created = Slot {
            id: SlotId::new(next(&mut self.working.seq.slot)),
            hcp_id: slot.hcp_id,
            date: slot.date,
            start: slot.start,
            end: slot.end,
            available: true,
        };
        self.working.slots.insert(created.id, created.clone());
        Ok(Some(created))
    }

    async fn slot(&mut self, id: SlotId) -> StorageResult<Option<Slot>> {
        Ok(self.working.slots.get(&id).cloned())
    }

    async fn claim_slot(&mut self, id: SlotId) -> StorageResult<bool> {
        match self.working.slots.get_mut(&id) {
            Some(slot) if slot.available => {
                slot.available = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn free_slot(&mut self, id: SlotId) -> StorageResult<()> {
        if let Some(slot) = self.working.slots.get_mut(&id) {
            slot.available = true;
        }
        Ok(())
    }

    async fn delete_slot(&mut self, id: SlotId) -> StorageResult<()> {
        if self.working.bookings.values().any(|b| b.slot_id == id) {
            return Err(foreign_key(constraints::BOOKING_SLOT));
        }
        self.working.slots.remove(&id);
        Ok(())
    }

    async fn slot_has_bookings(&mut self, id: SlotId) -> StorageResult<bool> {
        Ok(self.working.bookings.values().any(|b| b.slot_id == id))
    }

    async fn open_slots_on(&mut self, hcp: HcpId, date: NaiveDate) -> StorageResult<Vec<Slot>> {
        Ok(self.open_slots(hcp, |s| s.date == date))
    }

    async fn open_slots_after(&mut self, hcp: HcpId, after: NaiveDate) -> StorageResult<Vec<Slot>> {
        Ok(self.open_slots(hcp, |s| s.date > after))
    }

    async fn booking_on(&mut self, slot: SlotId, date: NaiveDate) -> StorageResult<Option<Booking>> {
        Ok(self
            .working
            .bookings
            .values()
            .find(|b| b.slot_id == slot && b.date == date)
            .cloned())
    }

    async fn booking_of(&mut self, appointment: AppointmentId) -> StorageResult<Option<Booking>> {
        Ok(self
            .working
            .bookings
            .values()
            .find(|b| b.appointment_id == appointment)
            .cloned())
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> StorageResult<Booking> {
        if !self.working.slots.contains_key(&booking.slot_id) {
            return Err(foreign_key(constraints::BOOKING_SLOT));
        }
        if self.slot_booked_on(booking.slot_id, booking.date) {
            return Err(unique(constraints::BOOKING_SLOT_DATE));
        }
        if self
            .working
            .bookings
            .values()
            .any(|b| b.appointment_id == booking.appointment_id)
        {
            return Err(unique(constraints::BOOKING_APPOINTMENT));
        }
        let created = Booking {
            id: BookingId::new(next(&mut self.working.seq.booking)),
            slot_id: booking.slot_id,
            date: booking.date,
            appointment_id: booking.appointment_id,
        };
        self.working.bookings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_booking(&mut self, id: BookingId) -> StorageResult<()> {
        self.working.bookings.remove(&id);
        Ok(())
    }

    async fn insert_appointment(&mut self, appointment: &NewAppointment) -> StorageResult<Appointment> {
        let created = Appointment {
            id: AppointmentId::new(next(&mut self.working.seq.appointment)),
            patient_id: appointment.patient_id,
            hcp_id: appointment.hcp_id,
            date_time: appointment.date_time,
            status: AppointmentStatus::Scheduled,
            priority: appointment.priority,
            notes: appointment.notes.clone(),
        };
        self.working.appointments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn appointment(&mut self, id: AppointmentId) -> StorageResult<Option<Appointment>> {
        Ok(self.working.appointments.get(&id).cloned())
    }

    async fn appointment_for_update(&mut self, id: AppointmentId) -> StorageResult<Option<Appointment>> {
        Ok(self.working.appointments.get(&id).cloned())
    }

    async fn set_appointment_status(
        &mut self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> StorageResult<()> {
        if let Some(appointment) = self.working.appointments.get_mut(&id) {
            appointment.status = status;
        }
        Ok(())
    }

    async fn appointments_of_hcp(&mut self, hcp: HcpId) -> StorageResult<Vec<Appointment>> {
        Ok(self.appointments_where(|a| a.hcp_id == hcp))
    }

    async fn scheduled_appointments_of_patient(
        &mut self,
        patient: PatientId,
    ) -> StorageResult<Vec<Appointment>> {
        Ok(self.appointments_where(|a| {
            a.patient_id == patient && a.status == AppointmentStatus::Scheduled
        }))
    }

    async fn scheduled_between(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<Appointment>> {
        let mut due = self.appointments_where(|a| {
            a.status == AppointmentStatus::Scheduled && from <= a.date_time && a.date_time < to
        });
        due.reverse();
        Ok(due)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::RoomKind;
    use chrono::NaiveTime;

    fn new_room(number: &str) -> NewRoom {
        NewRoom {
            number: number.to_string(),
            kind: RoomKind::Icu,
            daily_rate: Amount::from_units(5000),
            occupancy: Occupancy::Single { occupied: false },
        }
    }

    #[tokio::test]
    async fn rolled_back_writes_disappear() {
        let store = InMemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_room(&new_room("ICU-1")).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.rooms().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn committed_writes_are_visible_to_the_next_unit_of_work() {
        let store = InMemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_room(&new_room("ICU-1")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.rooms().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_room_numbers_violate_uniqueness() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_room(&new_room("ICU-1")).await.unwrap();

        let err = tx.insert_room(&new_room("ICU-1")).await.unwrap_err();
        assert!(err.is_unique_violation_of(constraints::ROOM_NUMBER));
    }

    #[tokio::test]
    async fn second_booking_for_a_slot_date_is_rejected() {
        let store = InMemoryStore::new();
        let hcp = store.seed_hcp("Dr. Rao", Designation::Doctor).await;
        let date = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();

        let mut tx = store.begin().await.unwrap();
        let slot = tx
            .insert_slot(&NewSlot {
                hcp_id: hcp.id,
                date,
                start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            })
            .await
            .unwrap();
        let book = |appointment| NewBooking {
            slot_id: slot.id,
            date,
            appointment_id: AppointmentId::new(appointment),
        };
        tx.insert_booking(&book(1)).await.unwrap();

        let err = tx.insert_booking(&book(2)).await.unwrap_err();
        assert!(err.is_unique_violation_of(constraints::BOOKING_SLOT_DATE));
        assert!(tx.open_slots_on(hcp.id, date).await.unwrap().is_empty());
    }
}
