//! Conflict rule engine.
//!
//! Two bookings in the same room conflict when their intervals overlap and
//! their recurrence cycles can land on the same calendar date. Cycle
//! compatibility is decided from the patterns alone, so recurring bookings
//! never need to be expanded to answer the question.

use anyhow::anyhow;
use chrono::{Datelike, Weekday};

use crate::errors::AdmissionError;
use crate::models::{Booking, BookingRequest, CalendarDate, ConflictResult, RecurrencePattern};

/// Knobs for the compatibility table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConflictRules {
    /// Treat `Weekly` against `Monthly` as able to co-occur.
    ///
    /// Off by default, which keeps the historical behaviour of never
    /// flagging that pair. Every weekday does fall on every day of the month
    /// eventually, so turning this on is the strict reading.
    pub weekly_meets_monthly: bool,
}

/// A booking's cycle with the one-off date folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Once(CalendarDate),
    Daily,
    Weekly(Weekday),
    Monthly(u32),
}

impl Cycle {
    fn of(request: &BookingRequest) -> Option<Cycle> {
        match request.recurrence {
            RecurrencePattern::None => request.date.map(Cycle::Once),
            RecurrencePattern::Daily => Some(Cycle::Daily),
            RecurrencePattern::Weekly { weekday } => Some(Cycle::Weekly(weekday)),
            RecurrencePattern::Monthly { day_of_month } => Some(Cycle::Monthly(day_of_month)),
        }
    }
}

impl ConflictRules {
    pub fn strict() -> Self {
        Self {
            weekly_meets_monthly: true,
        }
    }

    /// Whether two bookings can ever occur on the same date. Symmetric.
    ///
    /// A one-off request without a date has no occurrences and is compatible
    /// with nothing; callers validate before asking.
    pub fn compatible(&self, a: &BookingRequest, b: &BookingRequest) -> bool {
        match (Cycle::of(a), Cycle::of(b)) {
            (Some(a), Some(b)) => self.cycles_meet(a, b),
            _ => false,
        }
    }

    fn cycles_meet(&self, a: Cycle, b: Cycle) -> bool {
        use Cycle::*;
        match (a, b) {
            (Once(d1), Once(d2)) => d1 == d2,
            (Once(_), Daily) | (Daily, _) => true,
            (Once(d), Weekly(w)) => d.weekday() == w,
            (Once(d), Monthly(m)) => d.day() == m,
            (Weekly(w1), Weekly(w2)) => w1 == w2,
            (Weekly(_), Monthly(_)) => self.weekly_meets_monthly,
            (Monthly(m1), Monthly(m2)) => m1 == m2,
            (Weekly(_), Once(_) | Daily) | (Monthly(_), Once(_) | Daily | Weekly(_)) => {
                self.cycles_meet(b, a)
            }
        }
    }

    /// Returns the first booking in `existing` that conflicts with `candidate`.
    ///
    /// Bookings in other rooms and the one named by `exclude_id` are skipped.
    /// The scan follows slice order, so a fixed input always reports the
    /// same booking.
    pub fn find_conflict(
        &self,
        candidate: &BookingRequest,
        existing: &[Booking],
        exclude_id: Option<&str>,
    ) -> Result<ConflictResult, AdmissionError> {
        candidate.validate()?;

        let same_room = existing
            .iter()
            .filter(|e| Some(e.id.as_str()) != exclude_id)
            .filter(|e| e.room_id() == candidate.room_id);

        for e in same_room {
            if !candidate.interval.overlaps(&e.request.interval) {
                continue;
            }
            if Cycle::of(&e.request).is_none() {
                return Err(AdmissionError::Store(anyhow!(
                    "stored booking {} is one-off but has no date",
                    e.id
                )));
            }
            if self.compatible(candidate, &e.request) {
                return Ok(ConflictResult::Conflict {
                    with_booking_id: e.id.clone(),
                });
            }
        }

        Ok(ConflictResult::NoConflict)
    }
}

/// [`ConflictRules::find_conflict`] with the default rules.
pub fn find_conflict(
    candidate: &BookingRequest,
    existing: &[Booking],
    exclude_id: Option<&str>,
) -> Result<ConflictResult, AdmissionError> {
    ConflictRules::default().find_conflict(candidate, existing, exclude_id)
}
