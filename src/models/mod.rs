pub mod booking;
pub mod recurrence;
pub mod room;
pub mod time;

pub use booking::{Booking, BookingDraft, BookingId, BookingRequest, ConflictResult, RoomId};
pub use recurrence::{derive_key, occurs_on, CalendarDate, RecurrenceKey, RecurrencePattern};
pub use room::Room;
pub use time::{overlaps, Interval, TimeOfDay};
