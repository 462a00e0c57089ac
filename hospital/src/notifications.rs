//! Best-effort notifications to staff and patients.
//!
//! Delivery never takes part in a unit of work. The coordinator commits
//! first and then hands the notification to [`NotificationDispatcher`], which
//! delivers it on a background task with retries. Failures are logged and
//! counted, never reported to the caller.

use crate::metrics;
use crate::types::{AppointmentId, HcpId, PatientId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medbay_runtime::retry::{RetryPolicy, retry};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Something worth telling a person about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// An emergency appointment was created; the doctor should be alerted.
    EmergencyAppointment {
        /// New appointment.
        appointment_id: AppointmentId,
        /// Patient.
        patient_id: PatientId,
        /// Doctor to alert.
        hcp_id: HcpId,
        /// Appointment time.
        at: DateTime<Utc>,
        /// Notes from the booking.
        notes: Option<String>,
    },
    /// A scheduled appointment is coming up.
    AppointmentReminder {
        /// Upcoming appointment.
        appointment_id: AppointmentId,
        /// Patient to remind.
        patient_id: PatientId,
        /// Professional seen.
        hcp_id: HcpId,
        /// Appointment time.
        at: DateTime<Utc>,
    },
}

impl Notification {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EmergencyAppointment { .. } => "emergency_appointment",
            Self::AppointmentReminder { .. } => "appointment_reminder",
        }
    }
}

/// Delivery failed.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The transport could not reach the recipient service.
    #[error("delivery failed: {0}")]
    Transport(String),
    /// The recipient service refused the notification.
    #[error("rejected with status {0}")]
    Rejected(u16),
}

/// A notification transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails.
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::EmergencyAppointment {
                appointment_id,
                patient_id,
                hcp_id,
                at,
                notes,
            } => tracing::warn!(
                %appointment_id,
                %patient_id,
                %hcp_id,
                %at,
                notes = notes.as_deref().unwrap_or(""),
                "EMERGENCY appointment booked"
            ),
            Notification::AppointmentReminder {
                appointment_id,
                patient_id,
                at,
                ..
            } => tracing::info!(%appointment_id, %patient_id, %at, "Appointment reminder"),
        }
        Ok(())
    }
}

/// POSTs notifications as JSON to a notification service.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Deliver to `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(status.as_u16()))
        }
    }
}

/// Hands notifications to a [`Notifier`] off the request path.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
}

impl NotificationDispatcher {
    /// Dispatch through `notifier`, retrying per `policy`.
    pub fn new(notifier: Arc<dyn Notifier>, policy: RetryPolicy) -> Self {
        Self { notifier, policy }
    }

    /// Deliver with retries, waiting for the outcome.
    ///
    /// # Errors
    ///
    /// Returns the last delivery error once retries are exhausted.
    pub async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let outcome = retry(&self.policy, notification.kind(), || {
            self.notifier.deliver(notification)
        })
        .await;

        metrics::record_notification(notification.kind(), outcome.is_ok());
        outcome
    }

    /// Deliver on a background task. The caller never sees the outcome.
    pub fn fire_and_forget(&self, notification: Notification) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            if let Err(err) = dispatcher.deliver(&notification).await {
                tracing::warn!(kind = notification.kind(), error = %err, "Notification dropped");
            }
        })
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Flaky {
        failures_left: AtomicU32,
        delivered: AtomicU32,
    }

    #[async_trait]
    impl Notifier for Flaky {
        async fn deliver(&self, _: &Notification) -> Result<(), NotifyError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(NotifyError::Transport("connection reset".into()));
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn reminder() -> Notification {
        Notification::AppointmentReminder {
            appointment_id: AppointmentId::new(1),
            patient_id: PatientId::new(2),
            hcp_id: HcpId::new(3),
            at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    fn quick(max_retries: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(1))
            .build()
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let notifier = Arc::new(Flaky {
            failures_left: AtomicU32::new(2),
            delivered: AtomicU32::new(0),
        });
        let dispatcher = NotificationDispatcher::new(notifier.clone(), quick(3));

        dispatcher.deliver(&reminder()).await.unwrap();
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn background_failures_are_swallowed() {
        let notifier = Arc::new(Flaky {
            failures_left: AtomicU32::new(10),
            delivered: AtomicU32::new(0),
        });
        let dispatcher = NotificationDispatcher::new(notifier.clone(), quick(1));

        dispatcher.fire_and_forget(reminder()).await.unwrap();
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn notifications_serialize_with_a_kind_tag() {
        let json = serde_json::to_value(reminder()).unwrap();
        assert_eq!(json["kind"], "appointment_reminder");
        assert_eq!(json["appointment_id"], 1);
    }
}
