use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// A day on the facility calendar. No time zone is attached.
pub type CalendarDate = NaiveDate;

/// How often a booking repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "repeat", rename_all = "lowercase")]
pub enum RecurrencePattern {
    /// One-off booking; the date lives on the request itself.
    None,
    Daily,
    Weekly {
        #[serde(with = "weekday_index")]
        weekday: Weekday,
    },
    /// Months shorter than `day_of_month` are skipped, never clamped.
    Monthly {
        #[serde(deserialize_with = "day_of_month::deserialize")]
        day_of_month: u32,
    },
}

/// The cycle position fixed by an anchor date when a recurring booking is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceKey {
    pub weekday: Weekday,
    pub day_of_month: u32,
}

impl RecurrencePattern {
    pub fn weekly(weekday: Weekday) -> Self {
        RecurrencePattern::Weekly { weekday }
    }

    /// Returns `None` when `day_of_month` is outside 1..=31.
    pub fn monthly(day_of_month: u32) -> Option<Self> {
        (1..=31)
            .contains(&day_of_month)
            .then_some(RecurrencePattern::Monthly { day_of_month })
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, RecurrencePattern::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrencePattern::None => "none",
            RecurrencePattern::Daily => "daily",
            RecurrencePattern::Weekly { .. } => "weekly",
            RecurrencePattern::Monthly { .. } => "monthly",
        }
    }

    /// Whether the pattern produces an occurrence on `date`.
    ///
    /// `None` never matches here: one-off bookings are compared by their
    /// own date, not through the pattern.
    pub fn occurs_on(&self, date: CalendarDate) -> bool {
        match self {
            RecurrencePattern::None => false,
            RecurrencePattern::Daily => true,
            RecurrencePattern::Weekly { weekday } => date.weekday() == *weekday,
            RecurrencePattern::Monthly { day_of_month } => date.day() == *day_of_month,
        }
    }
}

pub fn occurs_on(pattern: &RecurrencePattern, date: CalendarDate) -> bool {
    pattern.occurs_on(date)
}

pub fn derive_key(date: CalendarDate) -> RecurrenceKey {
    RecurrenceKey {
        weekday: date.weekday(),
        day_of_month: date.day(),
    }
}

/// Sunday = 0 .. Saturday = 6, the numbering used on the wire and in storage.
pub fn weekday_from_index(index: u32) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

pub fn weekday_to_index(weekday: Weekday) -> u32 {
    weekday.num_days_from_sunday()
}

pub(crate) mod weekday_index {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(weekday: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(super::weekday_to_index(*weekday))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let index = u32::deserialize(deserializer)?;
        super::weekday_from_index(index)
            .ok_or_else(|| serde::de::Error::custom(format!("weekday out of range: {index}")))
    }
}

mod day_of_month {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let day = u32::deserialize(deserializer)?;
        if (1..=31).contains(&day) {
            Ok(day)
        } else {
            Err(serde::de::Error::custom(format!("day_of_month out of range: {day}")))
        }
    }
}
