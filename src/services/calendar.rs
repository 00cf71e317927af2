use chrono::{NaiveDate, Weekday};

use crate::models::{Booking, CalendarDate, RecurrencePattern};

/// First date the booking actually happens, for use as `DTSTART`.
///
/// Recurring bookings are anchored on their first occurrence on or after
/// the day they were created.
pub fn first_occurrence(booking: &Booking) -> Option<CalendarDate> {
    match booking.request.recurrence {
        RecurrencePattern::None => booking.request.date,
        pattern => {
            let from = booking.created_at.date();
            // Any day of month 1..=31 recurs within four years.
            from.iter_days()
                .take(366 * 4)
                .find(|d| pattern.occurs_on(*d))
        }
    }
}

fn byday(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn rrule(pattern: &RecurrencePattern) -> Option<String> {
    match pattern {
        RecurrencePattern::None => None,
        RecurrencePattern::Daily => Some("FREQ=DAILY".to_string()),
        RecurrencePattern::Weekly { weekday } => {
            Some(format!("FREQ=WEEKLY;BYDAY={}", byday(*weekday)))
        }
        RecurrencePattern::Monthly { day_of_month } => {
            Some(format!("FREQ=MONTHLY;BYMONTHDAY={day_of_month}"))
        }
    }
}

/// Escapes a TEXT property value (RFC 5545 section 3.3.11). Line breaks
/// become a literal `\n` so user text cannot start a new property.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders one booking as an iCalendar document in floating local time.
pub fn generate_ics(booking: &Booking, room_name: &str) -> Option<String> {
    let day: NaiveDate = first_occurrence(booking)?;
    let interval = booking.request.interval;
    let dtstart = day.and_time(interval.start().as_naive());
    let dtend = day.and_time(interval.end().as_naive());

    let dtstart = dtstart.format("%Y%m%dT%H%M%S");
    let dtend = dtend.format("%Y%m%dT%H%M%S");
    let dtstamp = booking.updated_at.format("%Y%m%dT%H%M%SZ");
    let uid = format!("{}@roombook", booking.id);

    let summary = if booking.request.description.is_empty() {
        format!("Booking: {room_name}")
    } else {
        format!("{} ({room_name})", booking.request.description)
    };
    let summary = escape_text(&summary);
    let location = escape_text(room_name);
    let rrule = rrule(&booking.request.recurrence)
        .map(|r| format!("RRULE:{r}\r\n"))
        .unwrap_or_default();

    Some(format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Roombook//Room Bookings//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         {rrule}\
         SUMMARY:{summary}\r\n\
         LOCATION:{location}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    ))
}
