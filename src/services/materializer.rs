//! Expands bookings into concrete dated occurrences for calendar views.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::models::{Booking, CalendarDate, RecurrencePattern};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub booking: Booking,
    pub occurrence_date: CalendarDate,
}

/// Every occurrence of `bookings` within `[from, to]`, both ends inclusive.
///
/// Sorted by date, then start time, then booking id. An inverted range
/// yields nothing.
pub fn expand(bookings: &[Booking], from: CalendarDate, to: CalendarDate) -> Vec<Occurrence> {
    let mut out = Vec::new();
    if from > to {
        return out;
    }

    for booking in bookings {
        match booking.request.recurrence {
            RecurrencePattern::None => {
                if let Some(day) = booking.request.date {
                    if from <= day && day <= to {
                        out.push(Occurrence {
                            booking: booking.clone(),
                            occurrence_date: day,
                        });
                    }
                }
            }
            pattern => {
                for day in from.iter_days().take_while(|d| *d <= to) {
                    if pattern.occurs_on(day) {
                        out.push(Occurrence {
                            booking: booking.clone(),
                            occurrence_date: day,
                        });
                    }
                }
            }
        }
    }

    out.sort_by(|a, b| {
        a.occurrence_date
            .cmp(&b.occurrence_date)
            .then(a.booking.request.interval.start().cmp(&b.booking.request.interval.start()))
            .then(a.booking.id.cmp(&b.booking.id))
    });
    out
}

/// Sunday-to-Saturday week containing `date`.
pub fn week_of(date: CalendarDate) -> (CalendarDate, CalendarDate) {
    let start = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
    (start, start + Duration::days(6))
}

/// First and last day of the month containing `date`.
pub fn month_of(date: CalendarDate) -> (CalendarDate, CalendarDate) {
    let first = date.with_day(1).unwrap_or(date);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month.and_then(|d| d.pred_opt()).unwrap_or(first);
    (first, last)
}
