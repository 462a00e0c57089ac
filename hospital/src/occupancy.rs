//! Occupancy Engine: rooms, admissions, discharges and the payment ledger.
//!
//! This is the only component that changes a room's occupancy. Every mutation
//! runs in one unit of work: the room (and admission) rows are locked, the
//! pure transition below is applied, and the admission row and room occupancy
//! are written together or not at all.
//!
//! ```text
//!  Single (Normal, ICU)           Shared (General, capacity c)
//!
//!  Available ──admit──▶ Occupied   0 ──▶ 1..c-1 ──▶ c
//!      ▲                   │       Available  Partially  Occupied
//!      └──── discharge ────┘                  Occupied
//! ```

use crate::error::{HospitalError, Result};
use crate::metrics;
use crate::store::{HospitalStore, WardRecords};
use crate::types::{
    Admission, AdmissionId, AdmittedPatient, Amount, NewAdmission, NewRoom, PatientId,
    PaymentEntry, Room, RoomId, RoomKind, RoomStatus,
};
use chrono::{DateTime, Utc};
use medbay_core::environment::Clock;
use medbay_core::storage::settle;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Pure occupancy model
// ============================================================================

/// How many patients a room holds right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Occupancy {
    /// Normal and ICU rooms: one patient at most.
    Single {
        /// Whether the patient's bed is taken.
        occupied: bool,
    },
    /// General wards.
    Shared {
        /// Beds in the ward, at least one.
        capacity: u32,
        /// Beds taken, `0..=capacity`.
        occupied: u32,
    },
}

/// A transition was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyError {
    /// The room cannot take another patient.
    #[error("room is fully occupied")]
    Full,
    /// A shared room needs a positive capacity.
    #[error("general rooms need a capacity of at least 1")]
    MissingCapacity,
    /// Stored counts disagree with the room kind.
    #[error("occupancy does not fit a {0} room")]
    Shape(RoomKind),
}

impl Occupancy {
    /// Empty occupancy for a new room of `kind`. Capacity is only read for General rooms.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::MissingCapacity`] for a General room without
    /// a positive capacity.
    pub fn vacant(kind: RoomKind, capacity: Option<u32>) -> std::result::Result<Self, OccupancyError> {
        match kind {
            RoomKind::Normal | RoomKind::Icu => Ok(Self::Single { occupied: false }),
            RoomKind::General => match capacity {
                Some(capacity) if capacity > 0 => Ok(Self::Shared {
                    capacity,
                    occupied: 0,
                }),
                _ => Err(OccupancyError::MissingCapacity),
            },
        }
    }

    /// Rebuild occupancy from stored columns.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Shape`] when the columns do not fit the kind.
    pub fn from_columns(
        kind: RoomKind,
        status: RoomStatus,
        capacity: Option<i32>,
        occupied: Option<i32>,
    ) -> std::result::Result<Self, OccupancyError> {
        match (kind, capacity, occupied) {
            (RoomKind::Normal | RoomKind::Icu, None, None) => match status {
                RoomStatus::Available => Ok(Self::Single { occupied: false }),
                RoomStatus::Occupied => Ok(Self::Single { occupied: true }),
                RoomStatus::PartiallyOccupied => Err(OccupancyError::Shape(kind)),
            },
            (RoomKind::General, Some(capacity), Some(occupied)) => {
                let capacity = u32::try_from(capacity).map_err(|_| OccupancyError::Shape(kind))?;
                let occupied = u32::try_from(occupied).map_err(|_| OccupancyError::Shape(kind))?;
                if capacity == 0 || occupied > capacity {
                    return Err(OccupancyError::Shape(kind));
                }
                Ok(Self::Shared { capacity, occupied })
            }
            _ => Err(OccupancyError::Shape(kind)),
        }
    }

    /// Status derived from the counts.
    #[must_use]
    pub const fn status(&self) -> RoomStatus {
        match *self {
            Self::Single { occupied: false }
            | Self::Shared { occupied: 0, .. } => RoomStatus::Available,
            Self::Single { occupied: true } => RoomStatus::Occupied,
            Self::Shared { capacity, occupied } if occupied >= capacity => RoomStatus::Occupied,
            Self::Shared { .. } => RoomStatus::PartiallyOccupied,
        }
    }

    /// Whether anyone is in the room.
    #[must_use]
    pub const fn has_occupants(&self) -> bool {
        !matches!(self.status(), RoomStatus::Available)
    }

    /// Capacity of a shared room.
    #[must_use]
    pub const fn capacity(&self) -> Option<u32> {
        match *self {
            Self::Single { .. } => None,
            Self::Shared { capacity, .. } => Some(capacity),
        }
    }

    /// Occupied beds of a shared room.
    #[must_use]
    pub const fn occupied_count(&self) -> Option<u32> {
        match *self {
            Self::Single { .. } => None,
            Self::Shared { occupied, .. } => Some(occupied),
        }
    }

    /// Free beds of a shared room.
    #[must_use]
    pub const fn remaining_capacity(&self) -> Option<u32> {
        match *self {
            Self::Single { .. } => None,
            Self::Shared { capacity, occupied } => Some(capacity.saturating_sub(occupied)),
        }
    }

    /// Occupancy after one more patient moves in.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Full`] when no bed is free.
    pub const fn admit(self) -> std::result::Result<Self, OccupancyError> {
        match self {
            Self::Single { occupied: false } => Ok(Self::Single { occupied: true }),
            Self::Single { occupied: true } => Err(OccupancyError::Full),
            Self::Shared { capacity, occupied } if occupied < capacity => Ok(Self::Shared {
                capacity,
                occupied: occupied + 1,
            }),
            Self::Shared { .. } => Err(OccupancyError::Full),
        }
    }

    /// Occupancy after one patient leaves. Never drops below empty.
    #[must_use]
    pub const fn discharge(self) -> Self {
        match self {
            Self::Single { .. } => Self::Single { occupied: false },
            Self::Shared { capacity, occupied } => Self::Shared {
                capacity,
                occupied: occupied.saturating_sub(1),
            },
        }
    }
}

/// Fee totals after charging `extra_charges` and receiving `paid`.
///
/// The balance may go negative; overpayment is recorded as credit.
#[must_use]
pub fn apply_payment(
    total_fee: Amount,
    remaining_fee: Amount,
    extra_charges: Amount,
    paid: Amount,
) -> (Amount, Amount) {
    (total_fee + extra_charges, remaining_fee + extra_charges - paid)
}

// ============================================================================
// Commands
// ============================================================================

/// Which patient to admit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatientRef {
    /// By id.
    Id(PatientId),
    /// By login name.
    Username(String),
}

/// A payment submitted with an admission or a fee update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentInput {
    /// Amount in whole units, non-negative.
    pub amount: Amount,
    /// Payment method.
    pub method: Option<String>,
    /// Free-form note.
    pub note: Option<String>,
}

/// Admit a patient to a room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmitPatient {
    /// Patient to admit.
    pub patient: PatientRef,
    /// Target room.
    pub room_id: RoomId,
    /// Fees charged at admission.
    pub total_fee: Amount,
    /// Outstanding balance; must equal `total_fee` minus the payments.
    pub remaining_fee: Amount,
    /// Payments taken at admission.
    pub payments: Vec<PaymentInput>,
}

/// Charge and/or collect on an admission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordPayment {
    /// Admission to update.
    pub admission_id: AdmissionId,
    /// Additional charges, non-negative.
    pub extra_charges: Amount,
    /// Payment received, non-negative.
    pub paid: PaymentInput,
}

/// Create a room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddRoom {
    /// Room number.
    pub number: String,
    /// Room kind.
    pub kind: RoomKind,
    /// Charge per day, positive.
    pub daily_rate: Amount,
    /// Beds; required for General rooms.
    pub capacity: Option<u32>,
}

/// Change an empty room. `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateRoom {
    /// New room number.
    pub number: Option<String>,
    /// New kind.
    pub kind: Option<RoomKind>,
    /// New charge per day.
    pub daily_rate: Option<Amount>,
    /// New capacity (General rooms).
    pub capacity: Option<u32>,
}

/// Rooms that can take a patient, grouped by kind.
pub type AvailableRooms = BTreeMap<RoomKind, Vec<Room>>;

// ============================================================================
// Engine
// ============================================================================

/// Serializes all room and admission mutations.
pub struct OccupancyEngine<D> {
    db: D,
    clock: Arc<dyn Clock>,
}

impl<D> OccupancyEngine<D> {
    /// Create an engine over `db`.
    pub fn new(db: D, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }
}

fn payment_entry(input: PaymentInput, at: DateTime<Utc>) -> Result<PaymentEntry> {
    if input.amount.is_negative() {
        return Err(HospitalError::validation("payment amounts cannot be negative"));
    }
    Ok(PaymentEntry {
        amount: input.amount,
        method: input.method,
        note: input.note,
        paid_at: at,
    })
}

fn validate_room_number(number: &str) -> Result<()> {
    if number.trim().is_empty() {
        return Err(HospitalError::validation("room_number is required"));
    }
    Ok(())
}

fn validate_rate(rate: Amount) -> Result<()> {
    if rate.units() <= 0 {
        return Err(HospitalError::validation("daily_rate must be positive"));
    }
    Ok(())
}

impl<D: HospitalStore> OccupancyEngine<D> {
    // ------------------------------------------------------------------------
    // Admissions
    // ------------------------------------------------------------------------

    /// Admit a patient: create the admission and take a bed in one unit of work.
    ///
    /// # Errors
    ///
    /// - `Validation` for negative fees or payments, or a remaining fee that
    ///   does not equal the total minus the initial payments
    /// - `NotFound` for an unknown patient or room
    /// - `Conflict` when the patient is already admitted or the room is full
    #[tracing::instrument(skip(self, cmd), fields(room_id = %cmd.room_id))]
    pub async fn admit(&self, cmd: AdmitPatient) -> Result<Admission> {
        let now = self.clock.now();

        if cmd.total_fee.is_negative() {
            return Err(HospitalError::validation("total_fee cannot be negative"));
        }
        let payments = cmd
            .payments
            .into_iter()
            .map(|p| payment_entry(p, now))
            .collect::<Result<Vec<_>>>()?;
        let paid: Amount = payments.iter().map(|p| p.amount).sum();
        if cmd.remaining_fee != cmd.total_fee - paid {
            return Err(HospitalError::validation(format!(
                "remaining_fee {} does not equal total_fee {} minus payments {paid}",
                cmd.remaining_fee, cmd.total_fee
            )));
        }

        let mut tx = self.db.begin().await?;
        let outcome: Result<Admission> = async {
            let patient = match &cmd.patient {
                PatientRef::Id(id) => tx.patient(*id).await?,
                PatientRef::Username(name) => tx.patient_by_username(name).await?,
            }
            .ok_or_else(|| match &cmd.patient {
                PatientRef::Id(id) => HospitalError::not_found("patient", id),
                PatientRef::Username(name) => HospitalError::not_found("patient", name),
            })?;

            if let Some(open) = tx.open_admission_of(patient.id).await? {
                return Err(HospitalError::conflict(format!(
                    "patient {} is already admitted (admission {open})",
                    patient.id
                )));
            }

            let room = tx
                .room_for_update(cmd.room_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("room", cmd.room_id))?;
            let occupancy = room.occupancy.admit().map_err(|_| {
                HospitalError::conflict(format!("room {} is {}", room.number, room.status()))
            })?;

            let admission = tx
                .insert_admission(&NewAdmission {
                    patient_id: patient.id,
                    room_id: room.id,
                    admit_time: now,
                    total_fee: cmd.total_fee,
                    remaining_fee: cmd.remaining_fee,
                    payments,
                })
                .await?;
            tx.set_occupancy(room.id, occupancy).await?;

            tracing::info!(
                admission_id = %admission.id,
                patient_id = %patient.id,
                status = %occupancy.status(),
                "Patient admitted"
            );
            Ok(admission)
        }
        .await;

        let admission = settle(tx, outcome).await?;
        metrics::record_admission();
        Ok(admission)
    }

    /// Add charges and/or record a payment on an admission.
    ///
    /// Amounts are whole units; the remaining balance may become negative.
    ///
    /// # Errors
    ///
    /// `Validation` for negative amounts, `NotFound` for an unknown admission.
    #[tracing::instrument(skip(self, cmd), fields(admission_id = %cmd.admission_id))]
    pub async fn record_payment(&self, cmd: RecordPayment) -> Result<Admission> {
        if cmd.extra_charges.is_negative() {
            return Err(HospitalError::validation("extra_charges cannot be negative"));
        }
        let entry = payment_entry(cmd.paid, self.clock.now())?;

        let mut tx = self.db.begin().await?;
        let outcome: Result<Admission> = async {
            let mut admission = tx
                .admission_for_update(cmd.admission_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("admission", cmd.admission_id))?;

            let (total, remaining) = apply_payment(
                admission.total_fee,
                admission.remaining_fee,
                cmd.extra_charges,
                entry.amount,
            );
            tx.set_fees(admission.id, total, remaining).await?;
            tx.append_payment(admission.id, &entry).await?;

            admission.total_fee = total;
            admission.remaining_fee = remaining;
            admission.payments.push(entry);

            if remaining.is_negative() {
                tracing::info!(remaining = %remaining, "Admission balance is in credit");
            }
            Ok(admission)
        }
        .await;

        let admission = settle(tx, outcome).await?;
        metrics::record_payment();
        Ok(admission)
    }

    /// Close an admission and free its bed in one unit of work.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown admission or room, `Conflict` when the
    /// admission is already closed.
    #[tracing::instrument(skip(self))]
    pub async fn discharge(&self, admission_id: AdmissionId) -> Result<Admission> {
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let outcome: Result<Admission> = async {
            let mut admission = tx
                .admission_for_update(admission_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("admission", admission_id))?;
            if !admission.is_open() {
                return Err(HospitalError::conflict(format!(
                    "admission {admission_id} is already discharged"
                )));
            }

            let room = tx
                .room_for_update(admission.room_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("room", admission.room_id))?;
            let occupancy = room.occupancy.discharge();

            tx.close_admission(admission.id, now).await?;
            tx.set_occupancy(room.id, occupancy).await?;
            admission.discharge_time = Some(now);

            tracing::info!(room_id = %room.id, status = %occupancy.status(), "Patient discharged");
            Ok(admission)
        }
        .await;

        let admission = settle(tx, outcome).await?;
        metrics::record_discharge();
        Ok(admission)
    }

    /// Open admissions with patient and room details.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn admitted(&self) -> Result<Vec<AdmittedPatient>> {
        let mut tx = self.db.begin().await?;
        let outcome = tx.open_admissions().await.map_err(HospitalError::from);
        let admitted = settle(tx, outcome).await?;
        metrics::set_open_admissions(admitted.len());
        Ok(admitted)
    }

    // ------------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------------

    /// Create an empty room.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank number, non-positive rate or a General room
    /// without capacity; `Conflict` for a duplicate room number.
    #[tracing::instrument(skip(self, cmd), fields(number = %cmd.number, kind = %cmd.kind))]
    pub async fn add_room(&self, cmd: AddRoom) -> Result<Room> {
        validate_room_number(&cmd.number)?;
        validate_rate(cmd.daily_rate)?;
        let occupancy = Occupancy::vacant(cmd.kind, cmd.capacity)
            .map_err(|e| HospitalError::validation(e.to_string()))?;

        let mut tx = self.db.begin().await?;
        let outcome = tx
            .insert_room(&NewRoom {
                number: cmd.number.trim().to_string(),
                kind: cmd.kind,
                daily_rate: cmd.daily_rate,
                occupancy,
            })
            .await
            .map_err(HospitalError::from);
        let room = settle(tx, outcome).await?;

        tracing::info!(room_id = %room.id, "Room added");
        Ok(room)
    }

    /// Change an empty room's number, kind, rate or capacity.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown room; `Conflict` when the room has occupants
    /// or the new number is taken; `Validation` for invalid values.
    #[tracing::instrument(skip(self, changes))]
    pub async fn update_room(&self, room_id: RoomId, changes: UpdateRoom) -> Result<Room> {
        if let Some(number) = &changes.number {
            validate_room_number(number)?;
        }
        if let Some(rate) = changes.daily_rate {
            validate_rate(rate)?;
        }

        let mut tx = self.db.begin().await?;
        let outcome: Result<Room> = async {
            let mut room = tx
                .room_for_update(room_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("room", room_id))?;
            if room.occupancy.has_occupants() {
                return Err(HospitalError::conflict(format!(
                    "room {} is {} and cannot be changed",
                    room.number,
                    room.status()
                )));
            }

            let kind = changes.kind.unwrap_or(room.kind);
            let capacity = changes.capacity.or_else(|| room.occupancy.capacity());
            room.occupancy = Occupancy::vacant(kind, capacity)
                .map_err(|e| HospitalError::validation(e.to_string()))?;
            room.kind = kind;
            if let Some(number) = changes.number {
                room.number = number.trim().to_string();
            }
            if let Some(rate) = changes.daily_rate {
                room.daily_rate = rate;
            }

            tx.save_room(&room).await?;
            Ok(room)
        }
        .await;

        settle(tx, outcome).await
    }

    /// Remove a room that has no occupants and no admission history.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown room, `Conflict` otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn delete_room(&self, room_id: RoomId) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<()> = async {
            let room = tx
                .room_for_update(room_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("room", room_id))?;
            if room.occupancy.has_occupants() {
                return Err(HospitalError::conflict(format!(
                    "room {} is {} and cannot be deleted",
                    room.number,
                    room.status()
                )));
            }
            if tx.room_has_admissions(room_id).await? {
                return Err(HospitalError::conflict(format!(
                    "room {} has admission history and cannot be deleted",
                    room.number
                )));
            }
            tx.delete_room(room_id).await?;
            Ok(())
        }
        .await;

        settle(tx, outcome).await?;
        tracing::info!("Room deleted");
        Ok(())
    }

    /// Every room.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn rooms(&self) -> Result<Vec<Room>> {
        let mut tx = self.db.begin().await?;
        let outcome = tx.rooms().await.map_err(HospitalError::from);
        settle(tx, outcome).await
    }

    /// Rooms with at least one free bed, grouped by kind.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn available_rooms(&self) -> Result<AvailableRooms> {
        let rooms = self.rooms().await?;
        let mut grouped = AvailableRooms::new();
        for room in rooms {
            if room.status() != RoomStatus::Occupied {
                grouped.entry(room.kind).or_default().push(room);
            }
        }
        Ok(grouped)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_rooms_flip_between_available_and_occupied() {
        let room = Occupancy::vacant(RoomKind::Icu, Some(8)).unwrap();
        assert_eq!(room, Occupancy::Single { occupied: false });

        let taken = room.admit();
        assert_eq!(taken, Ok(Occupancy::Single { occupied: true }));
        assert_eq!(Occupancy::Single { occupied: true }.admit(), Err(OccupancyError::Full));
        assert_eq!(
            Occupancy::Single { occupied: true }.discharge().status(),
            RoomStatus::Available
        );
    }

    #[test]
    fn shared_rooms_report_partial_then_full() {
        let mut ward = Occupancy::Shared { capacity: 2, occupied: 0 };
        assert_eq!(ward.status(), RoomStatus::Available);

        ward = ward.admit().unwrap();
        assert_eq!(ward.status(), RoomStatus::PartiallyOccupied);
        assert_eq!(ward.remaining_capacity(), Some(1));

        ward = ward.admit().unwrap();
        assert_eq!(ward.status(), RoomStatus::Occupied);
        assert_eq!(ward.admit(), Err(OccupancyError::Full));
    }

    #[test]
    fn discharging_an_empty_ward_stays_at_zero() {
        let ward = Occupancy::Shared { capacity: 3, occupied: 0 }.discharge();
        assert_eq!(ward.occupied_count(), Some(0));
    }

    #[test]
    fn general_rooms_need_capacity() {
        assert_eq!(
            Occupancy::vacant(RoomKind::General, None),
            Err(OccupancyError::MissingCapacity)
        );
        assert_eq!(
            Occupancy::vacant(RoomKind::General, Some(0)),
            Err(OccupancyError::MissingCapacity)
        );
    }

    #[test]
    fn stored_columns_must_match_kind() {
        assert_eq!(
            Occupancy::from_columns(RoomKind::Normal, RoomStatus::PartiallyOccupied, None, None),
            Err(OccupancyError::Shape(RoomKind::Normal))
        );
        assert_eq!(
            Occupancy::from_columns(RoomKind::General, RoomStatus::Occupied, Some(2), Some(3)),
            Err(OccupancyError::Shape(RoomKind::General))
        );
        assert_eq!(
            Occupancy::from_columns(RoomKind::General, RoomStatus::Available, Some(4), Some(1)),
            Ok(Occupancy::Shared { capacity: 4, occupied: 1 })
        );
    }

    #[test]
    fn overpayment_goes_into_credit() {
        let (total, remaining) = apply_payment(
            Amount::from_units(1000),
            Amount::from_units(200),
            Amount::ZERO,
            Amount::from_units(500),
        );
        assert_eq!(total, Amount::from_units(1000));
        assert_eq!(remaining, Amount::from_units(-300));
    }

    #[test]
    fn charges_raise_both_totals() {
        let (total, remaining) = apply_payment(
            Amount::from_units(1000),
            Amount::from_units(400),
            Amount::from_units(250),
            Amount::from_units(100),
        );
        assert_eq!(total, Amount::from_units(1250));
        assert_eq!(remaining, Amount::from_units(550));
    }

    proptest! {
        #[test]
        fn shared_occupancy_tracks_admits_minus_discharges(
            capacity in 1u32..20,
            steps in proptest::collection::vec(any::<bool>(), 0..60),
        ) {
            let mut ward = Occupancy::Shared { capacity, occupied: 0 };
            let mut expected: u32 = 0;
            for admit in steps {
                if admit {
                    match ward.admit() {
                        Ok(next) => { ward = next; expected += 1; }
                        Err(OccupancyError::Full) => prop_assert_eq!(expected, capacity),
                        Err(other) => prop_assert!(false, "unexpected {other:?}"),
                    }
                } else {
                    ward = ward.discharge();
                    expected = expected.saturating_sub(1);
                }
                prop_assert_eq!(ward.occupied_count(), Some(expected));
                let status = ward.status();
                let derived = if expected == 0 {
                    RoomStatus::Available
                } else if expected == capacity {
                    RoomStatus::Occupied
                } else {
                    RoomStatus::PartiallyOccupied
                };
                prop_assert_eq!(status, derived);
            }
        }
    }
}
