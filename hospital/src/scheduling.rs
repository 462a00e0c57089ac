//! Slot Scheduler: doctor availability slots and their binding to bookings.
//!
//! Slots of one professional on one date never overlap. Creation checks for
//! overlap against existing slots while holding a lock on the professional,
//! and the `(hcp_id, slot_date, start_time)` uniqueness rule backs it up.
//! Binding a slot to an appointment inserts a booking under the
//! `(slot_id, booking_date)` uniqueness rule and claims the slot with a
//! conditional update, so two racing bookings cannot both succeed.

use crate::error::{HospitalError, Result};
use crate::metrics;
use crate::store::{HospitalStore, ScheduleRecords};
use crate::types::{
    AppointmentId, Booking, Designation, HcpId, NewBooking, NewSlot, Slot, SlotId,
};
use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveTime, Weekday};
use medbay_core::environment::Clock;
use medbay_core::storage::settle;
use serde::Serialize;
use std::iter;
use std::sync::Arc;

// ============================================================================
// Time ranges and recurrence
// ============================================================================

/// A half-open time-of-day window `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeRange {
    /// Build a window.
    ///
    /// # Errors
    ///
    /// `Validation` unless `start < end`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(HospitalError::validation(format!(
                "start_time {start} must be before end_time {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Window start.
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    /// Window end.
    #[must_use]
    pub const fn end(&self) -> NaiveTime {
        self.end
    }

    /// Whether two windows share any instant. Touching windows do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    fn overlaps_slot(&self, slot: &Slot) -> bool {
        self.start < slot.end && slot.start < self.end
    }
}

/// Every `weekday` from `from` through `until`, inclusive, in order.
pub fn weekly_dates(
    weekday: Weekday,
    from: NaiveDate,
    until: NaiveDate,
) -> impl Iterator<Item = NaiveDate> {
    let ahead = (7 + weekday.num_days_from_monday() - from.weekday().num_days_from_monday()) % 7;
    let first = from.checked_add_days(Days::new(u64::from(ahead)));

    iter::successors(first, |date| date.checked_add_days(Days::new(7)))
        .take_while(move |date| *date <= until)
}

/// Parse a weekday name such as `Monday` or `mon`.
///
/// # Errors
///
/// `Validation` for anything else.
pub fn parse_weekday(name: &str) -> Result<Weekday> {
    name.trim()
        .parse::<Weekday>()
        .map_err(|_| HospitalError::validation(format!("'{name}' is not a day of the week")))
}

// ============================================================================
// Commands and views
// ============================================================================

/// Publish one slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddSlot {
    /// Publishing doctor.
    pub hcp_id: HcpId,
    /// Calendar date.
    pub date: NaiveDate,
    /// Window start.
    pub start: NaiveTime,
    /// Window end.
    pub end: NaiveTime,
}

/// Publish the same window on one weekday for a range of weeks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecurringSlots {
    /// Publishing doctor.
    pub hcp_id: HcpId,
    /// Day of the week.
    pub weekday: Weekday,
    /// Window start.
    pub start: NaiveTime,
    /// Window end.
    pub end: NaiveTime,
    /// First date considered.
    pub start_date: NaiveDate,
    /// Last date considered, inclusive.
    pub repeat_until: NaiveDate,
}

/// Result of a recurring publication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecurringOutcome {
    /// Slots inserted.
    pub created: usize,
    /// Candidate dates skipped because an identical slot appeared concurrently.
    pub skipped: usize,
}

/// A slot with its date presented at the display offset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlotView {
    /// Slot id.
    pub slot_id: SlotId,
    /// Owning professional.
    pub hcp_id: HcpId,
    /// Midnight of the slot date (UTC) expressed at the display offset.
    pub slot_date: DateTime<FixedOffset>,
    /// Window start.
    pub start_time: NaiveTime,
    /// Window end.
    pub end_time: NaiveTime,
    /// Always true for listed slots.
    pub is_available: bool,
}

impl SlotView {
    fn present(slot: Slot, offset: FixedOffset) -> Self {
        Self {
            slot_id: slot.id,
            hcp_id: slot.hcp_id,
            slot_date: slot
                .date
                .and_time(NaiveTime::default())
                .and_utc()
                .with_timezone(&offset),
            start_time: slot.start,
            end_time: slot.end,
            is_available: slot.available,
        }
    }
}

/// Bookable slots of one professional on one date, presented lazily.
#[derive(Debug)]
pub struct AvailableSlots {
    slots: std::vec::IntoIter<Slot>,
    offset: FixedOffset,
}

impl Iterator for AvailableSlots {
    type Item = SlotView;

    fn next(&mut self) -> Option<SlotView> {
        self.slots.next().map(|slot| SlotView::present(slot, self.offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl ExactSizeIterator for AvailableSlots {}

// ============================================================================
// Slot binding (used by the Booking Coordinator inside its unit of work)
// ============================================================================

/// Reserve `slot` on `date` for an appointment.
///
/// # Errors
///
/// `Conflict` when a booking for the slot and date already exists or the slot
/// was claimed concurrently.
pub async fn bind_slot<T: ScheduleRecords>(
    tx: &mut T,
    slot: &Slot,
    date: NaiveDate,
    appointment_id: AppointmentId,
) -> Result<Booking> {
    let booking = tx
        .insert_booking(&NewBooking {
            slot_id: slot.id,
            date,
            appointment_id,
        })
        .await?;

    if !tx.claim_slot(slot.id).await? {
        return Err(HospitalError::conflict(format!(
            "slot {} is no longer available",
            slot.id
        )));
    }
    Ok(booking)
}

/// Settle the booking of an appointment leaving its slot.
///
/// With `free_slot` the slot is marked available again; with `drop_booking`
/// the booking row is deleted. Appointments without a booking (emergencies)
/// are left alone.
///
/// # Errors
///
/// Storage failures only.
pub async fn release_slot<T: ScheduleRecords>(
    tx: &mut T,
    appointment_id: AppointmentId,
    free_slot: bool,
    drop_booking: bool,
) -> Result<()> {
    let Some(booking) = tx.booking_of(appointment_id).await? else {
        return Ok(());
    };

    if free_slot {
        tx.free_slot(booking.slot_id).await?;
    }
    if drop_booking {
        tx.delete_booking(booking.id).await?;
    }
    tracing::debug!(slot_id = %booking.slot_id, free_slot, drop_booking, "Slot released");
    Ok(())
}

// ============================================================================
// Engine
// ============================================================================

/// Publishes, lists and removes availability slots.
pub struct SlotScheduler<D> {
    db: D,
    clock: Arc<dyn Clock>,
    display_offset: FixedOffset,
}

impl<D> SlotScheduler<D> {
    /// Create a scheduler; listed slot dates are shown at `display_offset`.
    pub fn new(db: D, clock: Arc<dyn Clock>, display_offset: FixedOffset) -> Self {
        Self {
            db,
            clock,
            display_offset,
        }
    }
}

async fn require_doctor<T: ScheduleRecords>(tx: &mut T, hcp_id: HcpId) -> Result<()> {
    let hcp = tx
        .lock_hcp(hcp_id)
        .await?
        .ok_or_else(|| HospitalError::not_found("health care professional", hcp_id))?;
    if hcp.designation != Designation::Doctor {
        return Err(HospitalError::forbidden(format!(
            "only doctors can publish slots; {} is a {}",
            hcp.name, hcp.designation
        )));
    }
    Ok(())
}

impl<D: HospitalStore> SlotScheduler<D> {
    /// Publish one slot.
    ///
    /// # Errors
    ///
    /// - `Validation` unless start precedes end
    /// - `NotFound` for an unknown professional, `Forbidden` for a non-doctor
    /// - `Conflict` listing every existing slot the window overlaps
    #[tracing::instrument(skip(self, cmd), fields(hcp_id = %cmd.hcp_id, date = %cmd.date))]
    pub async fn add_slot(&self, cmd: AddSlot) -> Result<Slot> {
        let window = TimeRange::new(cmd.start, cmd.end)?;

        let mut tx = self.db.begin().await?;
        let outcome: Result<Slot> = async {
            require_doctor(&mut tx, cmd.hcp_id).await?;

            let overlapping: Vec<Slot> = tx
                .slots_on(cmd.hcp_id, cmd.date)
                .await?
                .into_iter()
                .filter(|slot| window.overlaps_slot(slot))
                .collect();
            if !overlapping.is_empty() {
                metrics::record_slot_conflict();
                return Err(HospitalError::slot_overlap(
                    "slot overlaps existing slots",
                    overlapping,
                ));
            }

            let slot = tx
                .insert_slot(&NewSlot {
                    hcp_id: cmd.hcp_id,
                    date: cmd.date,
                    start: window.start(),
                    end: window.end(),
                })
                .await?;
            Ok(slot)
        }
        .await;

        let slot = settle(tx, outcome).await?;
        metrics::record_slots_created(1);
        tracing::info!(slot_id = %slot.id, "Slot published");
        Ok(slot)
    }

    /// Publish the window on every matching weekday in the range.
    ///
    /// All or nothing: if any candidate date overlaps an existing slot, no slot
    /// is created and every conflict is reported.
    ///
    /// # Errors
    ///
    /// As [`SlotScheduler::add_slot`], plus `Validation` when the range ends
    /// before it starts.
    #[tracing::instrument(skip(self, cmd), fields(hcp_id = %cmd.hcp_id, weekday = %cmd.weekday))]
    pub async fn publish_weekly(&self, cmd: RecurringSlots) -> Result<RecurringOutcome> {
        let window = TimeRange::new(cmd.start, cmd.end)?;
        if cmd.repeat_until < cmd.start_date {
            return Err(HospitalError::validation(
                "repeat_until must not be before start_date",
            ));
        }
        let dates: Vec<NaiveDate> = weekly_dates(cmd.weekday, cmd.start_date, cmd.repeat_until).collect();

        let mut tx = self.db.begin().await?;
        let outcome: Result<RecurringOutcome> = async {
            require_doctor(&mut tx, cmd.hcp_id).await?;

            let mut conflicts = Vec::new();
            for date in &dates {
                conflicts.extend(
                    tx.slots_on(cmd.hcp_id, *date)
                        .await?
                        .into_iter()
                        .filter(|slot| window.overlaps_slot(slot)),
                );
            }
            if !conflicts.is_empty() {
                metrics::record_slot_conflict();
                return Err(HospitalError::slot_overlap(
                    format!("{} existing slots overlap the recurring window", conflicts.len()),
                    conflicts,
                ));
            }

            let mut created = 0;
            for date in &dates {
                let inserted = tx
                    .insert_slot_if_absent(&NewSlot {
                        hcp_id: cmd.hcp_id,
                        date: *date,
                        start: window.start(),
                        end: window.end(),
                    })
                    .await?;
                if inserted.is_some() {
                    created += 1;
                }
            }
            Ok(RecurringOutcome {
                created,
                skipped: dates.len() - created,
            })
        }
        .await;

        let result = settle(tx, outcome).await?;
        metrics::record_slots_created(result.created);
        tracing::info!(created = result.created, skipped = result.skipped, "Recurring slots published");
        Ok(result)
    }

    /// Bookable slots of a professional on a date: available and without a
    /// booking for that date.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn available_slots(&self, hcp_id: HcpId, date: NaiveDate) -> Result<AvailableSlots> {
        let mut tx = self.db.begin().await?;
        let outcome = tx.open_slots_on(hcp_id, date).await.map_err(HospitalError::from);
        let slots = settle(tx, outcome).await?;

        Ok(AvailableSlots {
            slots: slots.into_iter(),
            offset: self.display_offset,
        })
    }

    /// Bookable slots of a professional dated after today (at the display offset).
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown professional.
    pub async fn upcoming_slots(&self, hcp_id: HcpId) -> Result<Vec<Slot>> {
        let today = self.clock.now().with_timezone(&self.display_offset).date_naive();

        let mut tx = self.db.begin().await?;
        let outcome: Result<Vec<Slot>> = async {
            tx.hcp(hcp_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("health care professional", hcp_id))?;
            Ok(tx.open_slots_after(hcp_id, today).await?)
        }
        .await;
        settle(tx, outcome).await
    }

    /// One slot by id.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown slot.
    pub async fn slot(&self, slot_id: SlotId) -> Result<Slot> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<Slot> = async {
            tx.slot(slot_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("slot", slot_id))
        }
        .await;
        settle(tx, outcome).await
    }

    /// Remove a slot that no booking references.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown slot, `Conflict` when it has bookings.
    #[tracing::instrument(skip(self))]
    pub async fn delete_slot(&self, slot_id: SlotId) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<()> = async {
            tx.slot(slot_id)
                .await?
                .ok_or_else(|| HospitalError::not_found("slot", slot_id))?;
            if tx.slot_has_bookings(slot_id).await? {
                return Err(HospitalError::conflict(format!(
                    "slot {slot_id} is already booked"
                )));
            }
            tx.delete_slot(slot_id).await?;
            Ok(())
        }
        .await;

        settle(tx, outcome).await?;
        tracing::info!("Slot deleted");
        Ok(())
    }
}
