//! Configuration management for the hospital server.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unparseable values fall back to the default rather than failing startup.

use chrono::{FixedOffset, Offset, TimeDelta, Utc};
use medbay_postgres::PostgresConfig;
use medbay_runtime::RetryPolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which storage backend serves the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// `PostgreSQL` via `sqlx`.
    #[default]
    Postgres,
    /// Process-local tables, seeded with a demo directory.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Storage backend
    pub storage: StorageBackend,
    /// `PostgreSQL` configuration
    pub postgres: PostgresConfig,
    /// HTTP and metrics listeners
    pub server: ServerConfig,
    /// Slot presentation
    pub scheduling: SchedulingConfig,
    /// Notification delivery
    pub notifications: NotificationConfig,
    /// Appointment reminder job
    pub reminders: ReminderConfig,
    /// Authentication
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Slot presentation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingConfig {
    /// Offset from UTC, in minutes, at which slot dates are shown
    pub display_utc_offset_minutes: i32,
}

/// Notification delivery settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Webhook receiving notifications as JSON; log only when unset
    pub webhook_url: Option<String>,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_backoff_ms: u64,
}

/// Reminder job settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderConfig {
    /// Whether the job runs
    pub enabled: bool,
    /// How long before an appointment the reminder goes out, in minutes
    pub lead_minutes: i64,
    /// Scan cadence in seconds
    pub scan_interval_secs: u64,
}

/// Authentication settings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthConfig {
    /// Static bearer tokens, `token=role[:id],...`
    pub static_tokens: Option<String>,
}

const DEFAULT_DISPLAY_OFFSET_MINUTES: i32 = 330;

fn offset_seconds(minutes: i32) -> Option<FixedOffset> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt)
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, fallback: T) -> T {
            lookup(key).and_then(|s| s.trim().parse().ok()).unwrap_or(fallback)
        }

        let offset_minutes = parsed(&lookup, "DISPLAY_UTC_OFFSET_MINUTES", DEFAULT_DISPLAY_OFFSET_MINUTES);

        Self {
            storage: parsed(&lookup, "STORAGE_BACKEND", StorageBackend::default()),
            postgres: PostgresConfig::from_lookup(&lookup),
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parsed(&lookup, "PORT", 8080),
                metrics_host: lookup("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                metrics_port: parsed(&lookup, "METRICS_PORT", 9090),
                shutdown_timeout: parsed(&lookup, "SHUTDOWN_TIMEOUT", 30),
            },
            scheduling: SchedulingConfig {
                display_utc_offset_minutes: if offset_seconds(offset_minutes).is_some() {
                    offset_minutes
                } else {
                    DEFAULT_DISPLAY_OFFSET_MINUTES
                },
            },
            notifications: NotificationConfig {
                webhook_url: lookup("NOTIFICATION_WEBHOOK_URL").filter(|url| !url.trim().is_empty()),
                max_retries: parsed(&lookup, "NOTIFICATION_MAX_RETRIES", 3),
                initial_backoff_ms: parsed(&lookup, "NOTIFICATION_INITIAL_BACKOFF_MS", 200),
            },
            reminders: ReminderConfig {
                enabled: parsed(&lookup, "REMINDERS_ENABLED", true),
                lead_minutes: parsed(&lookup, "REMINDER_LEAD_MINUTES", 120_i64).clamp(0, 7 * 24 * 60),
                scan_interval_secs: parsed(&lookup, "REMINDER_SCAN_INTERVAL_SECS", 60).max(1),
            },
            auth: AuthConfig {
                static_tokens: lookup("AUTH_STATIC_TOKENS").filter(|s| !s.trim().is_empty()),
            },
        }
    }
}

impl ServerConfig {
    /// `host:port` of the HTTP listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `host:port` of the metrics listener.
    #[must_use]
    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.metrics_host, self.metrics_port)
    }
}

impl SchedulingConfig {
    /// The display offset.
    #[must_use]
    pub fn display_offset(&self) -> FixedOffset {
        offset_seconds(self.display_utc_offset_minutes).unwrap_or_else(|| Utc.fix())
    }
}

impl NotificationConfig {
    /// Retry policy for deliveries.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.max_retries)
            .initial_delay(Duration::from_millis(self.initial_backoff_ms))
            .build()
    }
}

impl ReminderConfig {
    /// Lead time before each appointment.
    #[must_use]
    pub fn lead(&self) -> TimeDelta {
        TimeDelta::minutes(self.lead_minutes)
    }

    /// Scan cadence.
    #[must_use]
    pub const fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]);
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.server.metrics_address(), "0.0.0.0:9090");
        assert_eq!(config.scheduling.display_offset().local_minus_utc(), 330 * 60);
        assert_eq!(config.notifications.webhook_url, None);
        assert!(config.reminders.enabled);
        assert_eq!(config.reminders.lead(), TimeDelta::minutes(120));
        assert_eq!(config.auth.static_tokens, None);
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("STORAGE_BACKEND", "Memory"),
            ("PORT", "3000"),
            ("DISPLAY_UTC_OFFSET_MINUTES", "-300"),
            ("NOTIFICATION_WEBHOOK_URL", "http://notify.local/hook"),
            ("REMINDERS_ENABLED", "false"),
            ("AUTH_STATIC_TOKENS", "t1=admin"),
        ]);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.scheduling.display_offset().local_minus_utc(), -300 * 60);
        assert_eq!(
            config.notifications.webhook_url.as_deref(),
            Some("http://notify.local/hook")
        );
        assert!(!config.reminders.enabled);
        assert_eq!(config.auth.static_tokens.as_deref(), Some("t1=admin"));
    }

    #[test]
    fn out_of_range_offsets_fall_back() {
        let config = load(&[("DISPLAY_UTC_OFFSET_MINUTES", "100000")]);
        assert_eq!(config.scheduling.display_utc_offset_minutes, 330);
    }

    #[test]
    fn unknown_backend_falls_back_to_postgres() {
        assert_eq!(load(&[("STORAGE_BACKEND", "redis")]).storage, StorageBackend::Postgres);
    }
}
