//! Slot publication, listing and deletion against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chrono::{Duration, Weekday};
use common::{Hospital, date, time};
use hospital::HospitalError;
use hospital::booking::BookAppointment;
use hospital::scheduling::{AddSlot, RecurringSlots};
use hospital::types::{HcpId, Priority, Slot};

async fn slot(h: &Hospital, day: chrono::NaiveDate, start: (u32, u32), end: (u32, u32)) -> Result<Slot, HospitalError> {
    h.scheduler
        .add_slot(AddSlot {
            hcp_id: h.doctor.id,
            date: day,
            start: time(start.0, start.1),
            end: time(end.0, end.1),
        })
        .await
}

#[tokio::test]
async fn overlapping_slot_is_rejected_with_the_existing_one() {
    let h = Hospital::new().await;
    let day = date(2025, 3, 14);

    let first = slot(&h, day, (9, 0), (10, 0)).await.unwrap();
    let err = slot(&h, day, (9, 30), (10, 30)).await.unwrap_err();

    match err {
        HospitalError::Conflict {
            conflicting_slots, ..
        } => assert_eq!(conflicting_slots, vec![first]),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(h.scheduler.available_slots(h.doctor.id, day).await.unwrap().len(), 1);
}

#[tokio::test]
async fn touching_slots_do_not_overlap() {
    let h = Hospital::new().await;
    let day = date(2025, 3, 14);

    slot(&h, day, (9, 0), (9, 30)).await.unwrap();
    slot(&h, day, (9, 30), (10, 0)).await.unwrap();
    // Same window on another day is independent
    slot(&h, date(2025, 3, 15), (9, 0), (9, 30)).await.unwrap();

    let listed: Vec<_> = h.scheduler.available_slots(h.doctor.id, day).await.unwrap().collect();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].start_time < listed[1].start_time);
}

#[tokio::test]
async fn only_doctors_publish_slots() {
    let h = Hospital::new().await;

    let err = h
        .scheduler
        .add_slot(AddSlot {
            hcp_id: h.nurse.id,
            date: date(2025, 3, 14),
            start: time(9, 0),
            end: time(10, 0),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HospitalError::Forbidden(_)));

    let err = h
        .scheduler
        .add_slot(AddSlot {
            hcp_id: HcpId::new(404),
            date: date(2025, 3, 14),
            start: time(9, 0),
            end: time(10, 0),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HospitalError::NotFound { .. }));
}

#[tokio::test]
async fn inverted_window_is_invalid() {
    let h = Hospital::new().await;
    let err = slot(&h, date(2025, 3, 14), (10, 0), (9, 0)).await.unwrap_err();
    assert!(matches!(err, HospitalError::Validation(_)));
}

#[tokio::test]
async fn weekly_series_creates_one_slot_per_matching_day() {
    let h = Hospital::new().await;

    let outcome = h
        .scheduler
        .publish_weekly(RecurringSlots {
            hcp_id: h.doctor.id,
            weekday: Weekday::Fri,
            start: time(14, 0),
            end: time(14, 30),
            start_date: date(2025, 3, 10),
            repeat_until: date(2025, 3, 31),
        })
        .await
        .unwrap();

    assert_eq!(outcome.created, 3);
    assert_eq!(outcome.skipped, 0);
    for day in [date(2025, 3, 14), date(2025, 3, 21), date(2025, 3, 28)] {
        assert_eq!(h.scheduler.available_slots(h.doctor.id, day).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn weekly_series_is_all_or_nothing() {
    let h = Hospital::new().await;
    // Third Friday already has an overlapping slot
    let existing = slot(&h, date(2025, 3, 28), (14, 15), (14, 45)).await.unwrap();

    let err = h
        .scheduler
        .publish_weekly(RecurringSlots {
            hcp_id: h.doctor.id,
            weekday: Weekday::Fri,
            start: time(14, 0),
            end: time(14, 30),
            start_date: date(2025, 3, 14),
            repeat_until: date(2025, 4, 4),
        })
        .await
        .unwrap_err();

    match err {
        HospitalError::Conflict {
            conflicting_slots, ..
        } => assert_eq!(conflicting_slots, vec![existing]),
        other => panic!("expected conflict, got {other:?}"),
    }
    for day in [date(2025, 3, 14), date(2025, 3, 21), date(2025, 4, 4)] {
        assert_eq!(
            h.scheduler.available_slots(h.doctor.id, day).await.unwrap().len(),
            0,
            "no slot may be created on {day}"
        );
    }
}

#[tokio::test]
async fn series_ending_before_it_starts_is_invalid() {
    let h = Hospital::new().await;
    let err = h
        .scheduler
        .publish_weekly(RecurringSlots {
            hcp_id: h.doctor.id,
            weekday: Weekday::Mon,
            start: time(9, 0),
            end: time(10, 0),
            start_date: date(2025, 4, 1),
            repeat_until: date(2025, 3, 1),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HospitalError::Validation(_)));
}

#[tokio::test]
async fn listed_slot_dates_use_the_display_offset() {
    let h = Hospital::new().await;
    let day = date(2025, 3, 14);
    slot(&h, day, (9, 0), (9, 30)).await.unwrap();

    let listed: Vec<_> = h.scheduler.available_slots(h.doctor.id, day).await.unwrap().collect();
    assert_eq!(listed[0].slot_date.to_rfc3339(), "2025-03-14T05:30:00+05:30");
    assert!(listed[0].is_available);
}

#[tokio::test]
async fn upcoming_slots_skip_today_and_booked_slots() {
    let h = Hospital::new().await;
    // Clock: 2025-03-10 10:00 at +05:30
    slot(&h, date(2025, 3, 10), (16, 0), (16, 30)).await.unwrap();
    let later = slot(&h, date(2025, 3, 12), (9, 0), (9, 30)).await.unwrap();
    let booked = slot(&h, date(2025, 3, 11), (9, 0), (9, 30)).await.unwrap();

    h.bookings
        .book(BookAppointment {
            patient_id: h.patient.id,
            hcp_id: None,
            slot_id: Some(booked.id),
            date: Some(booked.date),
            priority: Priority::Normal,
            notes: None,
        })
        .await
        .unwrap();

    let upcoming = h.scheduler.upcoming_slots(h.doctor.id).await.unwrap();
    assert_eq!(upcoming.iter().map(|s| s.id).collect::<Vec<_>>(), vec![later.id]);

    h.clock.advance(Duration::days(3));
    assert!(h.scheduler.upcoming_slots(h.doctor.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn booked_slots_cannot_be_deleted() {
    let h = Hospital::new().await;
    let day = date(2025, 3, 14);
    let free = slot(&h, day, (9, 0), (9, 30)).await.unwrap();
    let taken = slot(&h, day, (10, 0), (10, 30)).await.unwrap();

    h.bookings
        .book(BookAppointment {
            patient_id: h.patient.id,
            hcp_id: Some(h.doctor.id),
            slot_id: Some(taken.id),
            date: Some(day),
            priority: Priority::Normal,
            notes: None,
        })
        .await
        .unwrap();

    assert!(h.scheduler.delete_slot(taken.id).await.unwrap_err().is_conflict());
    h.scheduler.delete_slot(free.id).await.unwrap();
    assert!(matches!(
        h.scheduler.delete_slot(free.id).await,
        Err(HospitalError::NotFound { .. })
    ));
}
