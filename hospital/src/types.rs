//! Domain types for the hospital backend.
//!
//! Identifiers are database-assigned integers wrapped in newtypes so a slot id
//! can never be passed where a room id is expected. Money is held in whole
//! currency units.

use crate::occupancy::Occupancy;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw database id.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// The raw database id.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a room
    RoomId
);
id_type!(
    /// Identifier of a registered patient
    PatientId
);
id_type!(
    /// Identifier of an admission (open or closed)
    AdmissionId
);
id_type!(
    /// Identifier of a health-care professional
    HcpId
);
id_type!(
    /// Identifier of a doctor availability slot
    SlotId
);
id_type!(
    /// Identifier of a slot booking
    BookingId
);
id_type!(
    /// Identifier of an appointment
    AppointmentId
);

// ============================================================================
// Money
// ============================================================================

/// An amount of money in whole currency units. May be negative (credit).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

/// A submitted amount could not be turned into whole units.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("amount {0} is not a finite number in range")]
pub struct InvalidAmount(pub String);

impl Amount {
    /// Zero units.
    pub const ZERO: Self = Self(0);

    /// Amount from whole units.
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    /// Round a submitted decimal to the nearest whole unit.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidAmount`] for NaN, infinities and values beyond `i64`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn rounded(value: f64) -> Result<Self, InvalidAmount> {
        let rounded = value.round();
        if !rounded.is_finite() || rounded.abs() >= i64::MAX as f64 {
            return Err(InvalidAmount(value.to_string()));
        }
        Ok(Self(rounded as i64))
    }

    /// Whole units.
    #[must_use]
    pub const fn units(self) -> i64 {
        self.0
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Closed vocabularies
// ============================================================================

/// A stored or submitted label does not name a known variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    /// Vocabulary name.
    pub kind: &'static str,
    /// Offending label.
    pub value: String,
}

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident as $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The label used on the wire and in storage.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum! {
    /// Kind of room. Normal and ICU rooms hold one patient; General wards are shared.
    RoomKind as "room kind" {
        /// Single-occupancy ward room
        Normal => "Normal",
        /// Single-occupancy intensive care room
        Icu => "ICU",
        /// Shared ward with a capacity
        General => "General",
    }
}

labelled_enum! {
    /// Occupancy state of a room, always derived from its occupancy.
    RoomStatus as "room status" {
        /// No occupants
        Available => "Available",
        /// Single room taken, or shared ward full
        Occupied => "Occupied",
        /// Shared ward with some but not all beds taken
        PartiallyOccupied => "Partially Occupied",
    }
}

labelled_enum! {
    /// Professional designation of a health-care professional.
    Designation as "designation" {
        /// May publish availability slots
        Doctor => "Doctor",
        /// Nursing staff
        Nurse => "Nurse",
        /// Junior doctor
        JuniorDoctor => "Junior Doctor",
        /// Therapist
        Therapist => "Therapist",
    }
}

labelled_enum! {
    /// Lifecycle state of an appointment.
    AppointmentStatus as "appointment status" {
        /// Booked and pending
        Scheduled => "Scheduled",
        /// Took place
        Completed => "Completed",
        /// Called off
        Cancelled => "Cancelled",
        /// Moved to another time
        Rescheduled => "Rescheduled",
        /// Patient did not attend
        NoShow => "No-show",
        /// Awaiting confirmation
        Pending => "Pending",
    }
}

labelled_enum! {
    /// Booking path of an appointment.
    Priority as "priority" {
        /// Slot-bound booking
        Normal => "Normal",
        /// Immediate appointment bypassing slots
        Emergency => "Emergency",
    }
}

impl AppointmentStatus {
    /// Whether moving into this status frees the appointment's slot.
    #[must_use]
    pub const fn releases_slot(self) -> bool {
        match self {
            Self::Scheduled | Self::Pending => false,
            Self::Completed | Self::Cancelled | Self::Rescheduled | Self::NoShow => true,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

// ============================================================================
// Directory records (owned by the external user directory, read only here)
// ============================================================================

/// A registered patient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Patient {
    /// Patient id.
    pub id: PatientId,
    /// Login name, unique.
    pub username: String,
    /// Display name.
    pub name: String,
    /// Contact address for notifications.
    pub email: Option<String>,
}

/// A health-care professional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCareProfessional {
    /// Professional id.
    pub id: HcpId,
    /// Display name.
    pub name: String,
    /// Contact address for notifications.
    pub email: Option<String>,
    /// Professional designation.
    pub designation: Designation,
}

// ============================================================================
// Rooms and admissions
// ============================================================================

/// A room and its current occupancy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Room {
    /// Room id.
    pub id: RoomId,
    /// Human room number, unique.
    pub number: String,
    /// Room kind.
    pub kind: RoomKind,
    /// Charge per day.
    pub daily_rate: Amount,
    /// Current occupancy; the status is derived from it.
    pub occupancy: Occupancy,
}

impl Room {
    /// Derived status.
    #[must_use]
    pub const fn status(&self) -> RoomStatus {
        self.occupancy.status()
    }
}

/// A room to be created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRoom {
    /// Human room number.
    pub number: String,
    /// Room kind.
    pub kind: RoomKind,
    /// Charge per day.
    pub daily_rate: Amount,
    /// Initial (vacant) occupancy.
    pub occupancy: Occupancy,
}

/// One entry of an admission's payment ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEntry {
    /// Amount paid.
    pub amount: Amount,
    /// Payment method (cash, card, ...).
    pub method: Option<String>,
    /// Free-form note.
    pub note: Option<String>,
    /// When the payment was recorded.
    pub paid_at: DateTime<Utc>,
}

/// A patient's stay in a room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Admission {
    /// Admission id.
    #[serde(rename = "admission_id")]
    pub id: AdmissionId,
    /// Admitted patient.
    pub patient_id: PatientId,
    /// Room occupied.
    pub room_id: RoomId,
    /// When the patient was admitted.
    pub admit_time: DateTime<Utc>,
    /// When the patient left; `None` while the admission is open.
    pub discharge_time: Option<DateTime<Utc>>,
    /// Fees charged so far.
    pub total_fee: Amount,
    /// Outstanding balance (negative when overpaid).
    pub remaining_fee: Amount,
    /// Payment ledger, oldest first.
    pub payments: Vec<PaymentEntry>,
}

impl Admission {
    /// Whether the patient is still admitted.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.discharge_time.is_none()
    }
}

/// An admission to be created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAdmission {
    /// Admitted patient.
    pub patient_id: PatientId,
    /// Room occupied.
    pub room_id: RoomId,
    /// Admission time.
    pub admit_time: DateTime<Utc>,
    /// Initial fees.
    pub total_fee: Amount,
    /// Initial outstanding balance.
    pub remaining_fee: Amount,
    /// Payments taken at admission.
    pub payments: Vec<PaymentEntry>,
}

/// An open admission joined with its patient and room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdmittedPatient {
    /// The open admission.
    #[serde(flatten)]
    pub admission: Admission,
    /// Patient login name.
    pub patient_name: String,
    /// Room number.
    pub room_number: String,
    /// Current room status.
    pub room_status: RoomStatus,
}

// ============================================================================
// Slots, bookings and appointments
// ============================================================================

/// A doctor's availability window on one date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Slot {
    /// Slot id.
    #[serde(rename = "slot_id")]
    pub id: SlotId,
    /// Owning professional.
    pub hcp_id: HcpId,
    /// Calendar date.
    #[serde(rename = "slot_date")]
    pub date: NaiveDate,
    /// Window start.
    #[serde(rename = "start_time")]
    pub start: NaiveTime,
    /// Window end, after start.
    #[serde(rename = "end_time")]
    pub end: NaiveTime,
    /// Whether the slot can be booked.
    #[serde(rename = "is_available")]
    pub available: bool,
}

/// A slot to be created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSlot {
    /// Owning professional.
    pub hcp_id: HcpId,
    /// Calendar date.
    pub date: NaiveDate,
    /// Window start.
    pub start: NaiveTime,
    /// Window end.
    pub end: NaiveTime,
}

/// Reservation of a slot on a date by an appointment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Booking {
    /// Booking id.
    #[serde(rename = "booking_id")]
    pub id: BookingId,
    /// Reserved slot.
    pub slot_id: SlotId,
    /// Booked date.
    pub date: NaiveDate,
    /// Appointment holding the reservation.
    pub appointment_id: AppointmentId,
}

/// A booking to be created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBooking {
    /// Reserved slot.
    pub slot_id: SlotId,
    /// Booked date.
    pub date: NaiveDate,
    /// Appointment holding the reservation.
    pub appointment_id: AppointmentId,
}

/// A patient's appointment with a professional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Appointment {
    /// Appointment id.
    #[serde(rename = "appointment_id")]
    pub id: AppointmentId,
    /// Patient.
    pub patient_id: PatientId,
    /// Professional.
    pub hcp_id: HcpId,
    /// Scheduled time.
    pub date_time: DateTime<Utc>,
    /// Lifecycle state.
    pub status: AppointmentStatus,
    /// Booking path.
    pub priority: Priority,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// An appointment to be created (always `Scheduled`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAppointment {
    /// Patient.
    pub patient_id: PatientId,
    /// Professional.
    pub hcp_id: HcpId,
    /// Scheduled time.
    pub date_time: DateTime<Utc>,
    /// Booking path.
    pub priority: Priority,
    /// Free-form notes.
    pub notes: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_storage_text() {
        for status in AppointmentStatus::ALL {
            assert_eq!(status.as_str().parse::<AppointmentStatus>().unwrap(), *status);
        }
        assert_eq!("Partially Occupied".parse::<RoomStatus>().unwrap(), RoomStatus::PartiallyOccupied);
        assert_eq!(serde_json::to_string(&RoomKind::Icu).unwrap(), "\"ICU\"");
    }

    #[test]
    fn unknown_labels_are_rejected() {
        let err = "Suite".parse::<RoomKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown room kind 'Suite'");
    }

    #[test]
    fn only_terminal_statuses_release_slots() {
        assert!(!AppointmentStatus::Scheduled.releases_slot());
        assert!(AppointmentStatus::NoShow.releases_slot());
        assert!(AppointmentStatus::Rescheduled.releases_slot());
    }

    #[test]
    fn amounts_round_to_whole_units() {
        assert_eq!(Amount::rounded(149.5).unwrap(), Amount::from_units(150));
        assert_eq!(Amount::rounded(-0.4).unwrap(), Amount::ZERO);
        assert!(Amount::rounded(f64::NAN).is_err());
        assert!(Amount::rounded(f64::INFINITY).is_err());
    }

    #[test]
    fn amounts_sum() {
        let total: Amount = [100, 250, -50].into_iter().map(Amount::from_units).sum();
        assert_eq!(total, Amount::from_units(300));
    }
}
