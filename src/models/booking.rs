use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::recurrence::{derive_key, weekday_from_index, CalendarDate, RecurrencePattern};
use super::time::Interval;
use crate::errors::AdmissionError;

pub type RoomId = String;
pub type BookingId = String;

/// A candidate booking, validated field by field but not yet admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingRequest {
    pub room_id: RoomId,
    pub description: String,
    pub interval: Interval,
    #[serde(flatten)]
    pub recurrence: RecurrencePattern,
    /// Required for one-off bookings, ignored for recurring ones.
    pub date: Option<CalendarDate>,
}

impl BookingRequest {
    pub fn once(room_id: &str, description: &str, interval: Interval, date: CalendarDate) -> Self {
        Self {
            room_id: room_id.to_string(),
            description: description.to_string(),
            interval,
            recurrence: RecurrencePattern::None,
            date: Some(date),
        }
    }

    pub fn recurring(
        room_id: &str,
        description: &str,
        interval: Interval,
        recurrence: RecurrencePattern,
    ) -> Self {
        Self {
            room_id: room_id.to_string(),
            description: description.to_string(),
            interval,
            recurrence,
            date: None,
        }
    }

    /// Checks the recurrence/date invariant.
    pub fn validate(&self) -> Result<(), AdmissionError> {
        match self.recurrence {
            RecurrencePattern::None if self.date.is_none() => Err(
                AdmissionError::InvalidBookingRequest("one-off booking requires a date".into()),
            ),
            RecurrencePattern::Monthly { day_of_month } if !(1..=31).contains(&day_of_month) => {
                Err(AdmissionError::InvalidBookingRequest(format!(
                    "day of month out of range: {day_of_month}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Whether this booking has an occurrence on `date`.
    pub fn occurs_on(&self, date: CalendarDate) -> bool {
        match self.recurrence {
            RecurrencePattern::None => self.date == Some(date),
            pattern => pattern.occurs_on(date),
        }
    }
}

/// An admitted booking as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: String,
    #[serde(flatten)]
    pub request: BookingRequest,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn room_id(&self) -> &str {
        &self.request.room_id
    }
}

/// Outcome of a conflict check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResult {
    NoConflict,
    Conflict { with_booking_id: BookingId },
}

impl ConflictResult {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ConflictResult::Conflict { .. })
    }
}

/// Booking input as received from callers, before any parsing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingDraft {
    pub room_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub description: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub repeat: Option<String>,
    #[serde(default)]
    pub date: Option<CalendarDate>,
    #[serde(default)]
    pub weekday: Option<u32>,
    #[serde(default)]
    pub day_of_month: Option<u32>,
}

impl BookingDraft {
    /// Parses times and resolves the recurrence key.
    ///
    /// Recurring bookings take their key from the explicit field when given,
    /// otherwise from `date`. Once the key is fixed the date is dropped.
    pub fn normalize(&self) -> Result<BookingRequest, AdmissionError> {
        let interval = Interval::parse(&self.start, &self.end)?;
        let repeat = self.repeat.as_deref().map(str::trim).unwrap_or("none");

        let recurrence = match repeat.to_ascii_lowercase().as_str() {
            "" | "none" | "null" => RecurrencePattern::None,
            "daily" => RecurrencePattern::Daily,
            "weekly" => {
                let weekday = match (self.weekday, self.date) {
                    (Some(index), _) => weekday_from_index(index).ok_or_else(|| {
                        AdmissionError::InvalidBookingRequest(format!(
                            "weekday out of range: {index}"
                        ))
                    })?,
                    (None, Some(anchor)) => derive_key(anchor).weekday,
                    (None, None) => {
                        return Err(AdmissionError::InvalidBookingRequest(
                            "weekly booking requires a weekday or an anchor date".into(),
                        ))
                    }
                };
                RecurrencePattern::weekly(weekday)
            }
            "monthly" => {
                let day = match (self.day_of_month, self.date) {
                    (Some(day), _) => day,
                    (None, Some(anchor)) => derive_key(anchor).day_of_month,
                    (None, None) => {
                        return Err(AdmissionError::InvalidBookingRequest(
                            "monthly booking requires a day of month or an anchor date".into(),
                        ))
                    }
                };
                RecurrencePattern::monthly(day).ok_or_else(|| {
                    AdmissionError::InvalidBookingRequest(format!(
                        "day of month out of range: {day}"
                    ))
                })?
            }
            other => {
                return Err(AdmissionError::InvalidBookingRequest(format!(
                    "unknown repeat value: {other}"
                )))
            }
        };

        let date = if recurrence.is_recurring() { None } else { self.date };
        let request = BookingRequest {
            room_id: self.room_id.trim().to_string(),
            description: self.description.clone(),
            interval,
            recurrence,
            date,
        };
        request.validate()?;
        Ok(request)
    }
}
