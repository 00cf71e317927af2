pub mod bookings;
pub mod calendar;
pub mod health;
pub mod rooms;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/rooms", get(rooms::list_rooms).post(rooms::create_room))
        .route("/api/rooms/:id/bookings", get(rooms::room_bookings))
        .route("/api/rooms/:id/calendar", get(calendar::room_calendar))
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/check", post(bookings::check_booking))
        .route(
            "/api/bookings/:id",
            get(bookings::get_booking)
                .put(bookings::update_booking)
                .delete(bookings::delete_booking),
        )
        .route("/calendar/:booking_id", get(calendar::download_ics))
        .with_state(state)
}
