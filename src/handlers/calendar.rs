use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::BookingStore;
use crate::errors::AppError;
use crate::models::CalendarDate;
use crate::services::calendar::generate_ics;
use crate::services::materializer::{expand, month_of, week_of, Occurrence};
use crate::state::AppState;

// GET /api/rooms/:id/calendar
#[derive(Deserialize)]
pub struct CalendarQuery {
    pub from: Option<CalendarDate>,
    pub to: Option<CalendarDate>,
    pub week: Option<CalendarDate>,
    pub month: Option<CalendarDate>,
}

#[derive(Serialize)]
pub struct CalendarResponse {
    room_id: String,
    from: CalendarDate,
    to: CalendarDate,
    occurrences: Vec<Occurrence>,
}

impl CalendarQuery {
    fn range(&self) -> Result<(CalendarDate, CalendarDate), AppError> {
        match (self.week, self.month, self.from, self.to) {
            (Some(day), None, None, None) => Ok(week_of(day)),
            (None, Some(day), None, None) => Ok(month_of(day)),
            (None, None, Some(from), Some(to)) if from <= to => Ok((from, to)),
            (None, None, Some(_), Some(_)) => {
                Err(AppError::BadRequest("`from` must not be after `to`".to_string()))
            }
            _ => Err(AppError::BadRequest(
                "give exactly one of `week`, `month`, or `from` and `to`".to_string(),
            )),
        }
    }
}

pub async fn room_calendar(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarResponse>, AppError> {
    let (from, to) = query.range()?;
    let days = (to - from).num_days() + 1;
    if days > state.config.max_calendar_days {
        return Err(AppError::BadRequest(format!(
            "range of {days} days exceeds the limit of {}",
            state.config.max_calendar_days
        )));
    }

    if state.store.get_room(&room_id)?.is_none() {
        return Err(AppError::NotFound(format!("room {room_id}")));
    }
    let bookings = state.store.find_by_room(&room_id).await?;

    Ok(Json(CalendarResponse {
        occurrences: expand(&bookings, from, to),
        room_id,
        from,
        to,
    }))
}

// GET /calendar/:booking_id
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    // Strip .ics suffix if present
    let booking_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let booking = match state.store.find_by_id(booking_id).await {
        Ok(Some(b)) => b,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Booking not found").into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load booking for .ics");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
        }
    };

    let room_name = state
        .store
        .get_room(booking.room_id())
        .ok()
        .flatten()
        .map(|r| r.name)
        .unwrap_or_else(|| booking.room_id().to_string());

    let Some(ics) = generate_ics(&booking, &room_name) else {
        return (StatusCode::NOT_FOUND, "Booking has no occurrences").into_response();
    };
    let filename = format!("booking-{booking_id}.ics");

    (
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                &format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response()
}
