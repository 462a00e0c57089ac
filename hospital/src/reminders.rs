//! Periodic reminders for upcoming appointments.
//!
//! Every scan looks at scheduled appointments starting in
//! `[from, now + lead + interval)`, where `from` is where the previous
//! successful scan stopped (or `now + lead` on the first scan). Windows
//! therefore tile even when ticks are delayed or a scan runs long, and each
//! appointment is reminded about once.

use crate::error::{HospitalError, Result};
use crate::notifications::{Notification, NotificationDispatcher};
use crate::store::{HospitalStore, ScheduleRecords};
use chrono::{DateTime, TimeDelta, Utc};
use medbay_core::environment::Clock;
use medbay_core::storage::settle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Scans for upcoming appointments and sends reminders.
pub struct ReminderJob<D> {
    db: D,
    clock: Arc<dyn Clock>,
    notifications: NotificationDispatcher,
    lead: TimeDelta,
    interval: Duration,
    covered_until: Option<DateTime<Utc>>,
}

impl<D: HospitalStore> ReminderJob<D> {
    /// Remind `lead` ahead of each appointment, scanning every `interval`.
    pub fn new(
        db: D,
        clock: Arc<dyn Clock>,
        notifications: NotificationDispatcher,
        lead: TimeDelta,
        interval: Duration,
    ) -> Self {
        Self {
            db,
            clock,
            notifications,
            lead,
            interval,
            covered_until: None,
        }
    }

    /// Queue reminders for the current window; returns how many were queued.
    ///
    /// A failed scan leaves the window open, so the next scan retries it.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn scan_once(&mut self) -> Result<usize> {
        let ahead = self.clock.now() + self.lead;
        let to = ahead
            + TimeDelta::from_std(self.interval)
                .map_err(|e| HospitalError::validation(format!("reminder interval: {e}")))?;
        let from = self.covered_until.unwrap_or(ahead);
        if to <= from {
            return Ok(0);
        }

        let mut tx = self.db.begin().await?;
        let outcome = tx.scheduled_between(from, to).await.map_err(HospitalError::from);
        let due = settle(tx, outcome).await?;
        self.covered_until = Some(to);

        for appointment in &due {
            self.notifications.fire_and_forget(Notification::AppointmentReminder {
                appointment_id: appointment.id,
                patient_id: appointment.patient_id,
                hcp_id: appointment.hcp_id,
                at: appointment.date_time,
            });
        }
        if !due.is_empty() {
            tracing::info!(count = due.len(), %from, %to, "Appointment reminders queued");
        }
        Ok(due.len())
    }

    /// Scan on every tick until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(lead = %self.lead, interval = ?self.interval, "Reminder job started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Reminder job received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.scan_once().await {
                        tracing::error!(error = %err, "Reminder scan failed");
                    }
                }
            }
        }

        tracing::info!("Reminder job stopped");
    }
}
