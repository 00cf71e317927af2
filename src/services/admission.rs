use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::db::{BookingStore, RoomStore};
use crate::errors::AdmissionError;
use crate::models::{Booking, BookingDraft, BookingRequest, ConflictResult, RoomId};
use crate::services::conflict::ConflictRules;

/// One async mutex per room, created on first use.
#[derive(Default)]
pub struct RoomLocks {
    locks: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl RoomLocks {
    pub async fn acquire(&self, room_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is released before awaiting.
        let lock = self.locks.entry(room_id.to_string()).or_default().clone();
        lock.lock_owned().await
    }
}

/// Decides whether bookings may be created, changed or removed, and
/// performs the single store write when they may.
///
/// Load, check and write for a room run under that room's lock, so two
/// overlapping requests cannot both pass the check.
pub struct AdmissionService {
    rooms: Arc<dyn RoomStore>,
    bookings: Arc<dyn BookingStore>,
    rules: ConflictRules,
    locks: RoomLocks,
}

impl AdmissionService {
    pub fn new(rooms: Arc<dyn RoomStore>, bookings: Arc<dyn BookingStore>) -> Self {
        Self::with_rules(rooms, bookings, ConflictRules::default())
    }

    pub fn with_rules(
        rooms: Arc<dyn RoomStore>,
        bookings: Arc<dyn BookingStore>,
        rules: ConflictRules,
    ) -> Self {
        Self {
            rooms,
            bookings,
            rules,
            locks: RoomLocks::default(),
        }
    }

    pub async fn create(&self, draft: &BookingDraft) -> Result<Booking, AdmissionError> {
        let request = draft.normalize()?;
        self.create_request(&draft.user_id, request).await
    }

    pub async fn create_request(
        &self,
        user_id: &str,
        request: BookingRequest,
    ) -> Result<Booking, AdmissionError> {
        request.validate()?;
        self.ensure_room(&request.room_id).await?;

        let guard = self.locks.acquire(&request.room_id).await;
        let existing = self.load_room(&request.room_id).await?;
        self.reject_conflict(&request, &existing, None)?;

        let now = Utc::now().naive_utc();
        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            request,
            created_at: now,
            updated_at: now,
        };

        let store = Arc::clone(&self.bookings);
        let booking = run_to_completion(guard, async move { store.insert(booking).await }).await?;

        tracing::info!(
            booking_id = %booking.id,
            room_id = %booking.room_id(),
            repeat = booking.request.recurrence.as_str(),
            "booking admitted"
        );
        Ok(booking)
    }

    /// Replaces every request field of booking `id`. Owner, id and
    /// creation time are kept.
    pub async fn update(&self, id: &str, draft: &BookingDraft) -> Result<Booking, AdmissionError> {
        let request = draft.normalize()?;
        self.update_request(id, request).await
    }

    pub async fn update_request(
        &self,
        id: &str,
        request: BookingRequest,
    ) -> Result<Booking, AdmissionError> {
        request.validate()?;
        self.ensure_room(&request.room_id).await?;

        let guard = self.locks.acquire(&request.room_id).await;
        let current = self
            .bookings
            .find_by_id(id)
            .await
            .map_err(AdmissionError::Store)?
            .ok_or_else(|| AdmissionError::BookingNotFound(id.to_string()))?;

        let existing = self.load_room(&request.room_id).await?;
        self.reject_conflict(&request, &existing, Some(id))?;

        let booking = Booking {
            id: current.id,
            user_id: current.user_id,
            request,
            created_at: current.created_at,
            updated_at: Utc::now().naive_utc(),
        };

        let store = Arc::clone(&self.bookings);
        let target = id.to_string();
        let booking =
            run_to_completion(guard, async move { store.replace(&target, booking).await }).await?;

        tracing::info!(
            booking_id = %booking.id,
            room_id = %booking.room_id(),
            "booking updated"
        );
        Ok(booking)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AdmissionError> {
        let current = self
            .bookings
            .find_by_id(id)
            .await
            .map_err(AdmissionError::Store)?
            .ok_or_else(|| AdmissionError::BookingNotFound(id.to_string()))?;

        let guard = self.locks.acquire(current.room_id()).await;
        let store = Arc::clone(&self.bookings);
        let target = id.to_string();
        let removed = run_to_completion(guard, async move { store.delete(&target).await }).await?;

        if !removed {
            return Err(AdmissionError::BookingNotFound(id.to_string()));
        }
        tracing::info!(booking_id = %id, room_id = %current.room_id(), "booking deleted");
        Ok(())
    }

    /// Runs the conflict check without taking a lock or writing anything.
    pub async fn check(
        &self,
        request: &BookingRequest,
        exclude_id: Option<&str>,
    ) -> Result<ConflictResult, AdmissionError> {
        request.validate()?;
        self.ensure_room(&request.room_id).await?;
        let existing = self.load_room(&request.room_id).await?;
        self.rules.find_conflict(request, &existing, exclude_id)
    }

    async fn ensure_room(&self, room_id: &str) -> Result<(), AdmissionError> {
        let exists = self
            .rooms
            .room_exists(room_id)
            .await
            .map_err(AdmissionError::Store)?;
        if !exists {
            return Err(AdmissionError::RoomNotFound(room_id.to_string()));
        }
        Ok(())
    }

    /// Loads a room's bookings and holds the store to its contract.
    async fn load_room(&self, room_id: &str) -> Result<Vec<Booking>, AdmissionError> {
        let existing = self
            .bookings
            .find_by_room(room_id)
            .await
            .map_err(AdmissionError::Store)?;

        if let Some(stray) = existing.iter().find(|b| b.room_id() != room_id) {
            tracing::error!(
                booking_id = %stray.id,
                expected = %room_id,
                actual = %stray.room_id(),
                "store returned a booking for the wrong room"
            );
            return Err(AdmissionError::Store(anyhow!(
                "store returned booking {} of room {} when asked for room {room_id}",
                stray.id,
                stray.room_id()
            )));
        }
        Ok(existing)
    }

    fn reject_conflict(
        &self,
        request: &BookingRequest,
        existing: &[Booking],
        exclude_id: Option<&str>,
    ) -> Result<(), AdmissionError> {
        match self.rules.find_conflict(request, existing, exclude_id)? {
            ConflictResult::NoConflict => Ok(()),
            ConflictResult::Conflict { with_booking_id } => {
                tracing::warn!(
                    room_id = %request.room_id,
                    with_booking_id = %with_booking_id,
                    "booking rejected: conflict"
                );
                Err(AdmissionError::Conflict { with_booking_id })
            }
        }
    }
}

/// Drives a store write on its own task so that dropping the caller does
/// not abandon it half-done. The room guard is released once the write
/// has finished.
async fn run_to_completion<T, F>(guard: OwnedMutexGuard<()>, write: F) -> Result<T, AdmissionError>
where
    T: Send + 'static,
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let result = write.await;
        drop(guard);
        result
    });

    handle
        .await
        .map_err(|e| AdmissionError::Store(anyhow!("store write task failed: {e}")))?
        .map_err(|e| {
            tracing::error!(error = %e, "store write failed");
            AdmissionError::Store(e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::models::{Interval, RecurrencePattern};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn service(store: &Arc<InMemoryStore>) -> AdmissionService {
        AdmissionService::new(store.clone(), store.clone())
    }

    fn once(room: &str, day: &str, start: &str, end: &str) -> BookingRequest {
        BookingRequest::once(
            room,
            "",
            Interval::parse(start, end).unwrap(),
            NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_create_persists_once() {
        let store = Arc::new(InMemoryStore::with_rooms(&["R1"]));
        let svc = service(&store);

        let booking = svc
            .create_request("u1", once("R1", "2024-01-15", "09:00", "10:00"))
            .await
            .unwrap();

        assert_eq!(store.write_count(), 1);
        assert_eq!(store.all(), vec![booking]);
    }

    #[tokio::test]
    async fn test_unknown_room_rejected_without_write() {
        let store = Arc::new(InMemoryStore::with_rooms(&["R1"]));
        let svc = service(&store);

        let err = svc
            .create_request("u1", once("R9", "2024-01-15", "09:00", "10:00"))
            .await
            .unwrap_err();

        assert!(matches!(err, AdmissionError::RoomNotFound(ref r) if r == "R9"));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_conflict_rejected_without_write() {
        let store = Arc::new(InMemoryStore::with_rooms(&["R1"]));
        let svc = service(&store);
        let first = svc
            .create_request("u1", once("R1", "2024-01-15", "09:00", "10:00"))
            .await
            .unwrap();

        let err = svc
            .create_request("u2", once("R1", "2024-01-15", "09:30", "10:30"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AdmissionError::Conflict { ref with_booking_id } if *with_booking_id == first.id
        ));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_update_excludes_itself() {
        let store = Arc::new(InMemoryStore::with_rooms(&["R1"]));
        let svc = service(&store);
        let booking = svc
            .create_request("u1", once("R1", "2024-01-15", "09:00", "10:00"))
            .await
            .unwrap();

        let mut request = booking.request.clone();
        request.description = "Renamed".to_string();
        let updated = svc.update_request(&booking.id, request).await.unwrap();

        assert_eq!(updated.id, booking.id);
        assert_eq!(updated.user_id, "u1");
        assert_eq!(updated.created_at, booking.created_at);
        assert_eq!(updated.request.description, "Renamed");
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_booking() {
        let store = Arc::new(InMemoryStore::with_rooms(&["R1"]));
        let svc = service(&store);
        let err = svc
            .update_request("nope", once("R1", "2024-01-15", "09:00", "10:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::BookingNotFound(_)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = Arc::new(InMemoryStore::with_rooms(&["R1"]));
        let svc = service(&store);
        let booking = svc
            .create_request("u1", once("R1", "2024-01-15", "09:00", "10:00"))
            .await
            .unwrap();

        svc.delete(&booking.id).await.unwrap();
        assert!(store.all().is_empty());
        assert!(matches!(
            svc.delete(&booking.id).await,
            Err(AdmissionError::BookingNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_draft_never_reaches_store() {
        let store = Arc::new(InMemoryStore::with_rooms(&["R1"]));
        let svc = service(&store);
        let draft = BookingDraft {
            room_id: "R1".to_string(),
            start: "25:00".to_string(),
            end: "26:00".to_string(),
            ..Default::default()
        };
        assert!(matches!(svc.create(&draft).await, Err(AdmissionError::InvalidTime(_))));

        let draft = BookingDraft {
            room_id: "R1".to_string(),
            start: "09:00".to_string(),
            end: "10:00".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            svc.create(&draft).await,
            Err(AdmissionError::InvalidBookingRequest(_))
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_check_does_not_write() {
        let store = Arc::new(InMemoryStore::with_rooms(&["R1"]));
        let svc = service(&store);
        svc.create_request(
            "u1",
            BookingRequest::recurring(
                "R1",
                "",
                Interval::parse("09:00", "10:00").unwrap(),
                RecurrencePattern::Daily,
            ),
        )
        .await
        .unwrap();

        let result = svc
            .check(&once("R1", "2030-05-05", "09:59", "10:30"), None)
            .await
            .unwrap();
        assert!(result.is_conflict());
        assert_eq!(store.write_count(), 1);
    }

    /// Answers every room query with a booking from somewhere else.
    struct WrongRoomStore {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl BookingStore for WrongRoomStore {
        async fn find_by_room(&self, _room_id: &str) -> anyhow::Result<Vec<Booking>> {
            self.inner.find_by_room("R2").await
        }
        async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Booking>> {
            self.inner.find_by_id(id).await
        }
        async fn insert(&self, booking: Booking) -> anyhow::Result<Booking> {
            self.inner.insert(booking).await
        }
        async fn replace(&self, id: &str, booking: Booking) -> anyhow::Result<Booking> {
            self.inner.replace(id, booking).await
        }
        async fn delete(&self, id: &str) -> anyhow::Result<bool> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_store_contract_violation_aborts() {
        let inner = InMemoryStore::with_rooms(&["R1", "R2"]);
        let now = Utc::now().naive_utc();
        inner
            .insert(Booking {
                id: "stray".to_string(),
                user_id: "u1".to_string(),
                request: once("R2", "2024-01-15", "09:00", "10:00"),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let rooms: Arc<dyn RoomStore> = Arc::new(InMemoryStore::with_rooms(&["R1", "R2"]));
        let bookings: Arc<dyn BookingStore> = Arc::new(WrongRoomStore { inner });
        let svc = AdmissionService::new(rooms, bookings);

        let err = svc
            .create_request("u1", once("R1", "2024-03-01", "12:00", "13:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Store(_)));
    }
}
