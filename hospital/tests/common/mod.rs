//! Shared fixtures for the hospital integration tests.

#![allow(dead_code)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use hospital::booking::BookingCoordinator;
use hospital::notifications::{Notification, NotificationDispatcher, Notifier, NotifyError};
use hospital::occupancy::OccupancyEngine;
use hospital::scheduling::SlotScheduler;
use hospital::store::InMemoryStore;
use hospital::types::{Designation, HealthCareProfessional, Patient};
use medbay_core::environment::Clock;
use medbay_runtime::RetryPolicy;
use medbay_testing::{ManualClock, test_clock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Records every delivered notification on a channel.
pub struct RecordingNotifier {
    sent: mpsc::UnboundedSender<Notification>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .send(notification.clone())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

/// A notifier paired with the receiving end of its channel.
pub fn recording_notifier() -> (Arc<RecordingNotifier>, mpsc::UnboundedReceiver<Notification>) {
    let (sent, received) = mpsc::unbounded_channel();
    (Arc::new(RecordingNotifier { sent }), received)
}

/// No retries, no waiting.
pub fn quick_retries() -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(0)
        .initial_delay(Duration::from_millis(1))
        .build()
}

/// +05:30, the default display offset.
pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(330 * 60).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Engines over one in-memory store with a small directory.
///
/// The clock starts at Monday 2025-03-10 04:30 UTC.
pub struct Hospital {
    pub store: InMemoryStore,
    pub clock: ManualClock,
    pub occupancy: OccupancyEngine<InMemoryStore>,
    pub scheduler: SlotScheduler<InMemoryStore>,
    pub bookings: BookingCoordinator<InMemoryStore>,
    pub dispatcher: NotificationDispatcher,
    pub sent: mpsc::UnboundedReceiver<Notification>,
    pub patient: Patient,
    pub other_patient: Patient,
    pub doctor: HealthCareProfessional,
    pub nurse: HealthCareProfessional,
}

impl Hospital {
    pub async fn new() -> Self {
        medbay_testing::init_tracing();

        let store = InMemoryStore::new();
        let patient = store.seed_patient("asha", "Asha Rao").await;
        let other_patient = store.seed_patient("kiran", "Kiran Das").await;
        let doctor = store.seed_hcp("Dr. Meera Iyer", Designation::Doctor).await;
        let nurse = store.seed_hcp("Ravi Nair", Designation::Nurse).await;

        let clock = ManualClock::new(test_clock().now());
        let (notifier, sent) = recording_notifier();
        let dispatcher = NotificationDispatcher::new(notifier, quick_retries());

        Self {
            occupancy: OccupancyEngine::new(store.clone(), Arc::new(clock.clone())),
            scheduler: SlotScheduler::new(store.clone(), Arc::new(clock.clone()), ist()),
            bookings: BookingCoordinator::new(
                store.clone(),
                Arc::new(clock.clone()),
                dispatcher.clone(),
            ),
            store,
            clock,
            dispatcher,
            sent,
            patient,
            other_patient,
            doctor,
            nurse,
        }
    }

    /// Current test time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Next delivered notification, waiting up to a second.
    pub async fn next_notification(&mut self) -> Notification {
        tokio::time::timeout(Duration::from_secs(1), self.sent.recv())
            .await
            .expect("no notification within a second")
            .expect("notifier channel closed")
    }
}
