use anyhow::{anyhow, Context};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::recurrence::{weekday_from_index, weekday_to_index};
use crate::models::{Booking, BookingRequest, Interval, RecurrencePattern, Room, TimeOfDay};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const BOOKING_COLUMNS: &str = "id, room_id, user_id, description, start_time, end_time, repeat, \
     booking_date, weekday, day_of_month, created_at, updated_at";

// ── Rooms ──

/// Returns `false` when a room with the same id already exists.
pub fn create_room(conn: &Connection, room: &Room) -> anyhow::Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO rooms (id, name, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO NOTHING",
        params![room.id, room.name, room.created_at.format(TS_FORMAT).to_string()],
    )?;
    Ok(inserted == 1)
}

pub fn get_room(conn: &Connection, id: &str) -> anyhow::Result<Option<Room>> {
    conn.query_row(
        "SELECT id, name, created_at FROM rooms WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    )
    .optional()?
    .map(|(id, name, created_at)| -> anyhow::Result<Room> {
        Ok(Room {
            id,
            name,
            created_at: parse_timestamp(&created_at)?,
        })
    })
    .transpose()
}

pub fn list_rooms(conn: &Connection) -> anyhow::Result<Vec<Room>> {
    let mut stmt = conn.prepare("SELECT id, name, created_at FROM rooms ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut rooms = vec![];
    for row in rows {
        let (id, name, created_at) = row?;
        rooms.push(Room {
            id,
            name,
            created_at: parse_timestamp(&created_at)?,
        });
    }
    Ok(rooms)
}

pub fn room_exists(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM rooms WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let columns = BookingColumns::from(booking);
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            booking.id,
            booking.request.room_id,
            booking.user_id,
            booking.request.description,
            columns.start_time,
            columns.end_time,
            booking.request.recurrence.as_str(),
            columns.booking_date,
            columns.weekday,
            columns.day_of_month,
            columns.created_at,
            columns.updated_at,
        ],
    )?;
    Ok(())
}

/// Overwrites every column except `id`. Returns false when no row matched.
pub fn replace_booking(conn: &Connection, id: &str, booking: &Booking) -> anyhow::Result<bool> {
    let columns = BookingColumns::from(booking);
    let count = conn.execute(
        "UPDATE bookings SET room_id = ?1, user_id = ?2, description = ?3, start_time = ?4,
             end_time = ?5, repeat = ?6, booking_date = ?7, weekday = ?8, day_of_month = ?9,
             created_at = ?10, updated_at = ?11
         WHERE id = ?12",
        params![
            booking.request.room_id,
            booking.user_id,
            booking.request.description,
            columns.start_time,
            columns.end_time,
            booking.request.recurrence.as_str(),
            columns.booking_date,
            columns.weekday,
            columns.day_of_month,
            columns.created_at,
            columns.updated_at,
            id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Oldest first, so conflict scans see a stable order.
pub fn get_bookings_for_room(conn: &Connection, room_id: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE room_id = ?1 ORDER BY created_at ASC, id ASC"
    ))?;

    let rows = stmt.query_map(params![room_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Newest first, across all rooms.
pub fn get_all_bookings(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC, id ASC LIMIT ?1"
    ))?;

    let rows = stmt.query_map(params![limit], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Column values that need formatting before they reach SQLite.
struct BookingColumns {
    start_time: String,
    end_time: String,
    booking_date: Option<String>,
    weekday: Option<u32>,
    day_of_month: Option<u32>,
    created_at: String,
    updated_at: String,
}

impl From<&Booking> for BookingColumns {
    fn from(booking: &Booking) -> Self {
        let (weekday, day_of_month) = match booking.request.recurrence {
            RecurrencePattern::Weekly { weekday } => (Some(weekday_to_index(weekday)), None),
            RecurrencePattern::Monthly { day_of_month } => (None, Some(day_of_month)),
            RecurrencePattern::None | RecurrencePattern::Daily => (None, None),
        };
        Self {
            start_time: booking.request.interval.start().to_string(),
            end_time: booking.request.interval.end().to_string(),
            booking_date: booking
                .request
                .date
                .map(|d| d.format(DATE_FORMAT).to_string()),
            weekday,
            day_of_month,
            created_at: booking.created_at.format(TS_FORMAT).to_string(),
            updated_at: booking.updated_at.format(TS_FORMAT).to_string(),
        }
    }
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let room_id: String = row.get(1)?;
    let user_id: String = row.get(2)?;
    let description: String = row.get(3)?;
    let start_str: String = row.get(4)?;
    let end_str: String = row.get(5)?;
    let repeat: String = row.get(6)?;
    let date_str: Option<String> = row.get(7)?;
    let weekday: Option<u32> = row.get(8)?;
    let day_of_month: Option<u32> = row.get(9)?;
    let created_at_str: String = row.get(10)?;
    let updated_at_str: String = row.get(11)?;

    let interval = Interval::new(TimeOfDay::parse(&start_str)?, TimeOfDay::parse(&end_str)?)
        .with_context(|| format!("booking {id} has an invalid interval"))?;

    let recurrence = match repeat.as_str() {
        "none" => RecurrencePattern::None,
        "daily" => RecurrencePattern::Daily,
        "weekly" => {
            let weekday = weekday
                .and_then(weekday_from_index)
                .ok_or_else(|| anyhow!("weekly booking {id} has no valid weekday"))?;
            RecurrencePattern::weekly(weekday)
        }
        "monthly" => day_of_month
            .and_then(RecurrencePattern::monthly)
            .ok_or_else(|| anyhow!("monthly booking {id} has no valid day of month"))?,
        other => return Err(anyhow!("booking {id} has unknown repeat value: {other}")),
    };

    let date = date_str
        .map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT))
        .transpose()
        .with_context(|| format!("booking {id} has an invalid date"))?;

    Ok(Booking {
        request: BookingRequest {
            room_id,
            description,
            interval,
            recurrence,
            date,
        },
        user_id,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
        id,
    })
}

fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).with_context(|| format!("invalid timestamp: {s}"))
}
