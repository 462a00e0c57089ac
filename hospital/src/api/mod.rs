//! HTTP API of the hospital backend.
//!
//! Handlers are thin: they check the caller's capability, translate the wire
//! shape into an engine command and map the engine's error onto a status.
//! - Rooms: `/room/*`
//! - Admissions: `/admission/*`
//! - Slots and appointments: `/appointment/*`

pub mod admissions;
pub mod appointments;
pub mod rooms;

use crate::error::HospitalError;
use crate::types::Amount;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human readable outcome
    pub message: String,
}

impl MessageResponse {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Round a submitted decimal amount to whole units.
pub(crate) fn amount(field: &str, value: f64) -> Result<Amount, HospitalError> {
    Amount::rounded(value).map_err(|e| HospitalError::validation(format!("{field}: {e}")))
}

/// Parse a calendar day given as `YYYY-MM-DD` or as an RFC 3339 timestamp.
///
/// Timestamps are converted to UTC before the date is taken.
pub(crate) fn parse_day(raw: &str) -> Result<NaiveDate, HospitalError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc).date_naive())
        .map_err(|_| HospitalError::validation(format!("invalid date '{raw}'")))
}

/// Parse a wall-clock time given as `HH:MM` or `HH:MM:SS`.
pub(crate) fn parse_clock_time(raw: &str) -> Result<NaiveTime, HospitalError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| HospitalError::validation(format!("invalid time '{raw}'")))
}

/// Serde adapter for [`parse_clock_time`].
pub(crate) fn clock_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_clock_time(&raw).map_err(serde::de::Error::custom)
}

/// Serde adapter for [`parse_day`].
pub(crate) fn calendar_day<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_day(&raw).map_err(serde::de::Error::custom)
}
