//! Storage collaborators used by the admission service.
//!
//! Stores are not expected to serialize admissions themselves; the
//! [`AdmissionService`](crate::services::admission::AdmissionService) holds
//! a per-room lock from the load through the write.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;

use super::queries;
use crate::models::{Booking, Room};

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn room_exists(&self, room_id: &str) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Every booking held for `room_id`, in a stable order.
    async fn find_by_room(&self, room_id: &str) -> anyhow::Result<Vec<Booking>>;

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Booking>>;

    async fn insert(&self, booking: Booking) -> anyhow::Result<Booking>;

    /// Full replacement of the booking stored under `id`.
    async fn replace(&self, id: &str, booking: Booking) -> anyhow::Result<Booking>;

    async fn delete(&self, id: &str) -> anyhow::Result<bool>;
}

// ── SQLite ──

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    /// `None` when the id is already taken.
    pub fn create_room(&self, id: &str, name: &str) -> anyhow::Result<Option<Room>> {
        let room = Room {
            id: id.to_string(),
            name: name.to_string(),
            created_at: Utc::now().naive_utc(),
        };
        let db = self.conn()?;
        Ok(queries::create_room(&db, &room)?.then_some(room))
    }

    pub fn list_rooms(&self) -> anyhow::Result<Vec<Room>> {
        let db = self.conn()?;
        queries::list_rooms(&db)
    }

    pub fn get_room(&self, id: &str) -> anyhow::Result<Option<Room>> {
        let db = self.conn()?;
        queries::get_room(&db, id)
    }

    pub fn recent_bookings(&self, limit: i64) -> anyhow::Result<Vec<Booking>> {
        let db = self.conn()?;
        queries::get_all_bookings(&db, limit)
    }
}

#[async_trait]
impl RoomStore for SqliteStore {
    async fn room_exists(&self, room_id: &str) -> anyhow::Result<bool> {
        let db = self.conn()?;
        queries::room_exists(&db, room_id)
    }
}

#[async_trait]
impl BookingStore for SqliteStore {
    async fn find_by_room(&self, room_id: &str) -> anyhow::Result<Vec<Booking>> {
        let db = self.conn()?;
        queries::get_bookings_for_room(&db, room_id)
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Booking>> {
        let db = self.conn()?;
        queries::get_booking_by_id(&db, id)
    }

    async fn insert(&self, booking: Booking) -> anyhow::Result<Booking> {
        let db = self.conn()?;
        queries::insert_booking(&db, &booking)?;
        Ok(booking)
    }

    async fn replace(&self, id: &str, booking: Booking) -> anyhow::Result<Booking> {
        let db = self.conn()?;
        if !queries::replace_booking(&db, id, &booking)? {
            return Err(anyhow!("booking {id} vanished before replace"));
        }
        Ok(booking)
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let db = self.conn()?;
        queries::delete_booking(&db, id)
    }
}

// ── In-memory ──

/// Insertion-ordered store for tests and embedding.
#[derive(Default)]
pub struct InMemoryStore {
    rooms: Mutex<Vec<String>>,
    bookings: Mutex<Vec<Booking>>,
    writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rooms(rooms: &[&str]) -> Self {
        let store = Self::new();
        for room in rooms {
            store.add_room(room);
        }
        store
    }

    pub fn add_room(&self, room_id: &str) {
        if let Ok(mut rooms) = self.rooms.lock() {
            if !rooms.iter().any(|r| r == room_id) {
                rooms.push(room_id.to_string());
            }
        }
    }

    /// Number of insert, replace and delete calls that changed the store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn all(&self) -> Vec<Booking> {
        self.bookings.lock().map(|b| b.clone()).unwrap_or_default()
    }

    fn bookings(&self) -> anyhow::Result<MutexGuard<'_, Vec<Booking>>> {
        self.bookings
            .lock()
            .map_err(|_| anyhow!("booking list mutex poisoned"))
    }
}

#[async_trait]
impl RoomStore for InMemoryStore {
    async fn room_exists(&self, room_id: &str) -> anyhow::Result<bool> {
        let rooms = self
            .rooms
            .lock()
            .map_err(|_| anyhow!("room list mutex poisoned"))?;
        Ok(rooms.iter().any(|r| r == room_id))
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn find_by_room(&self, room_id: &str) -> anyhow::Result<Vec<Booking>> {
        Ok(self
            .bookings()?
            .iter()
            .filter(|b| b.room_id() == room_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Booking>> {
        Ok(self.bookings()?.iter().find(|b| b.id == id).cloned())
    }

    async fn insert(&self, booking: Booking) -> anyhow::Result<Booking> {
        let mut bookings = self.bookings()?;
        if bookings.iter().any(|b| b.id == booking.id) {
            return Err(anyhow!("duplicate booking id {}", booking.id));
        }
        bookings.push(booking.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(booking)
    }

    async fn replace(&self, id: &str, booking: Booking) -> anyhow::Result<Booking> {
        let mut bookings = self.bookings()?;
        let slot = bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| anyhow!("booking {id} vanished before replace"))?;
        *slot = booking.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(booking)
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let mut bookings = self.bookings()?;
        let before = bookings.len();
        bookings.retain(|b| b.id != id);
        let removed = bookings.len() != before;
        if removed {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }
}
