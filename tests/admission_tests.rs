use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Barrier;

use roombook::db::{BookingStore, InMemoryStore, RoomStore};
use roombook::errors::AdmissionError;
use roombook::models::{Booking, BookingDraft, BookingRequest, Interval, RecurrencePattern};
use roombook::services::admission::AdmissionService;

// ── Helpers ──

fn iv(start: &str, end: &str) -> Interval {
    Interval::parse(start, end).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn once(room: &str, start: &str, end: &str, day: &str) -> BookingRequest {
    BookingRequest::once(room, "", iv(start, end), date(day))
}

fn recurring(room: &str, start: &str, end: &str, pattern: RecurrencePattern) -> BookingRequest {
    BookingRequest::recurring(room, "", iv(start, end), pattern)
}

fn fixture() -> (Arc<InMemoryStore>, AdmissionService) {
    let store = Arc::new(InMemoryStore::with_rooms(&["R1", "R2"]));
    let svc = AdmissionService::new(store.clone(), store.clone());
    (store, svc)
}

/// Slows every load and write so concurrent admissions overlap in time.
struct SlowStore {
    inner: InMemoryStore,
    delay: Duration,
}

#[async_trait]
impl RoomStore for SlowStore {
    async fn room_exists(&self, room_id: &str) -> anyhow::Result<bool> {
        self.inner.room_exists(room_id).await
    }
}

#[async_trait]
impl BookingStore for SlowStore {
    async fn find_by_room(&self, room_id: &str) -> anyhow::Result<Vec<Booking>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_by_room(room_id).await
    }
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Booking>> {
        self.inner.find_by_id(id).await
    }
    async fn insert(&self, booking: Booking) -> anyhow::Result<Booking> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert(booking).await
    }
    async fn replace(&self, id: &str, booking: Booking) -> anyhow::Result<Booking> {
        tokio::time::sleep(self.delay).await;
        self.inner.replace(id, booking).await
    }
    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        self.inner.delete(id).await
    }
}

// ── End-to-end scenarios ──

#[tokio::test]
async fn test_single_bookings_same_date_conflict() {
    let (_, svc) = fixture();
    let first = svc
        .create_request("u1", once("R1", "09:00", "10:00", "2024-01-15"))
        .await
        .unwrap();

    let err = svc
        .create_request("u2", once("R1", "09:30", "10:30", "2024-01-15"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::Conflict { ref with_booking_id } if *with_booking_id == first.id
    ));
}

#[tokio::test]
async fn test_weekly_booking_blocks_matching_weekday_only() {
    let (_, svc) = fixture();
    svc.create_request(
        "u1",
        BookingRequest::recurring(
            "R1",
            "Bible study",
            iv("09:00", "10:00"),
            RecurrencePattern::weekly(chrono::Weekday::Mon),
        ),
    )
    .await
    .unwrap();

    // 2024-01-15 is a Monday, 2024-01-16 a Tuesday
    let monday = svc
        .create_request("u2", once("R1", "09:00", "09:30", "2024-01-15"))
        .await;
    assert!(matches!(monday, Err(AdmissionError::Conflict { .. })));

    let tuesday = svc
        .create_request("u2", once("R1", "09:00", "09:30", "2024-01-16"))
        .await;
    assert!(tuesday.is_ok());
}

#[tokio::test]
async fn test_monthly_bookings_on_same_day_conflict() {
    let (_, svc) = fixture();
    let fifteenth = RecurrencePattern::Monthly { day_of_month: 15 };
    let sixteenth = RecurrencePattern::Monthly { day_of_month: 16 };
    svc.create_request("u1", recurring("R1", "14:00", "15:00", fifteenth))
        .await
        .unwrap();

    let same = svc
        .create_request("u2", recurring("R1", "14:30", "15:30", fifteenth))
        .await;
    assert!(matches!(same, Err(AdmissionError::Conflict { .. })));

    let next_day = svc
        .create_request("u2", recurring("R1", "14:30", "15:30", sixteenth))
        .await;
    assert!(next_day.is_ok());
}

#[tokio::test]
async fn test_rooms_are_independent() {
    let (store, svc) = fixture();
    svc.create_request("u1", recurring("R1", "00:00", "23:59", RecurrencePattern::Daily))
        .await
        .unwrap();
    svc.create_request("u1", recurring("R2", "00:00", "23:59", RecurrencePattern::Daily))
        .await
        .unwrap();
    assert_eq!(store.write_count(), 2);
}

#[tokio::test]
async fn test_repeated_rejection_is_stable() {
    let (store, svc) = fixture();
    svc.create_request("u1", once("R1", "09:00", "10:00", "2024-01-15"))
        .await
        .unwrap();
    svc.create_request("u1", recurring("R1", "09:00", "10:00", RecurrencePattern::Daily))
        .await
        .unwrap_err();

    let candidate = once("R1", "09:15", "09:45", "2024-01-15");
    let first = svc.create_request("u2", candidate.clone()).await.unwrap_err();
    let second = svc.create_request("u2", candidate).await.unwrap_err();

    match (first, second) {
        (
            AdmissionError::Conflict { with_booking_id: a },
            AdmissionError::Conflict { with_booking_id: b },
        ) => assert_eq!(a, b),
        other => panic!("expected two conflicts, got {other:?}"),
    }
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn test_update_with_unchanged_interval_succeeds() {
    let (store, svc) = fixture();
    let draft = BookingDraft {
        room_id: "R1".to_string(),
        user_id: "u1".to_string(),
        description: "Choir".to_string(),
        start: "18:00".to_string(),
        end: "20:00".to_string(),
        repeat: Some("weekly".to_string()),
        date: Some(date("2024-01-17")),
        ..Default::default()
    };
    let booking = svc.create(&draft).await.unwrap();

    let updated = svc.update(&booking.id, &draft).await.unwrap();
    assert_eq!(updated.id, booking.id);
    assert_eq!(updated.request, booking.request);
    assert_eq!(store.all().len(), 1);
}

#[tokio::test]
async fn test_update_into_conflict_keeps_old_booking() {
    let (store, svc) = fixture();
    let blocker = svc
        .create_request("u1", once("R1", "12:00", "13:00", "2024-01-15"))
        .await
        .unwrap();
    let movable = svc
        .create_request("u1", once("R1", "08:00", "09:00", "2024-01-15"))
        .await
        .unwrap();

    let err = svc
        .update_request(&movable.id, once("R1", "12:30", "13:30", "2024-01-15"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::Conflict { ref with_booking_id } if *with_booking_id == blocker.id
    ));

    let stored = store.find_by_id(&movable.id).await.unwrap().unwrap();
    assert_eq!(stored, movable);
}

#[tokio::test]
async fn test_update_can_move_to_another_room() {
    let (store, svc) = fixture();
    let booking = svc
        .create_request("u1", once("R1", "08:00", "09:00", "2024-01-15"))
        .await
        .unwrap();

    let moved = svc
        .update_request(&booking.id, once("R2", "08:00", "09:00", "2024-01-15"))
        .await
        .unwrap();
    assert_eq!(moved.room_id(), "R2");
    assert!(store.find_by_room("R1").await.unwrap().is_empty());
}

// ── Concurrency ──

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_admit_exactly_one() {
    let store = Arc::new(SlowStore {
        inner: InMemoryStore::with_rooms(&["R1"]),
        delay: Duration::from_millis(20),
    });
    let svc = Arc::new(AdmissionService::new(store.clone(), store.clone()));
    let barrier = Arc::new(Barrier::new(2));

    let mut handles = Vec::new();
    for user in ["u1", "u2"] {
        let svc = svc.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            svc.create_request(
                user,
                once("R1", "09:00", "10:00", "2024-01-15"),
            )
            .await
        }));
    }

    let mut ok = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(AdmissionError::Conflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!((ok, conflicts), (1, 1));
    assert_eq!(store.inner.write_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_creates_one_winner() {
    let store = Arc::new(SlowStore {
        inner: InMemoryStore::with_rooms(&["R1"]),
        delay: Duration::from_millis(5),
    });
    let svc = Arc::new(AdmissionService::new(store.clone(), store.clone()));

    let mut handles = Vec::new();
    for i in 0..8 {
        let svc = svc.clone();
        let pattern = if i % 2 == 0 {
            RecurrencePattern::Daily
        } else {
            RecurrencePattern::weekly(chrono::Weekday::Mon)
        };
        handles.push(tokio::spawn(async move {
            svc.create_request("u1", recurring("R1", "09:00", "10:00", pattern))
                .await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(store.inner.write_count(), 1);
}

#[tokio::test]
async fn test_dropped_caller_does_not_abort_issued_write() {
    let store = Arc::new(SlowStore {
        inner: InMemoryStore::with_rooms(&["R1"]),
        delay: Duration::from_millis(50),
    });
    let svc = AdmissionService::new(store.clone(), store.clone());
    let request = once("R1", "09:00", "10:00", "2024-01-15");

    // Load takes 50ms and the insert another 50ms; give up in between.
    let attempt =
        tokio::time::timeout(Duration::from_millis(75), svc.create_request("u1", request.clone()))
            .await;
    assert!(attempt.is_err(), "caller should have timed out");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.inner.write_count(), 1);

    // The lock was released once the write finished.
    let again = svc.create_request("u2", request).await;
    assert!(matches!(again, Err(AdmissionError::Conflict { .. })));
}
