use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::BookingStore;
use crate::errors::AppError;
use crate::models::{Booking, BookingDraft, ConflictResult};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<BookingDraft>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.admission.create(&draft).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    Ok(Json(state.store.recent_bookings(limit)?))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    state
        .store
        .find_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}

// PUT /api/bookings/:id
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(draft): Json<BookingDraft>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.admission.update(&id, &draft).await?))
}

// DELETE /api/bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.admission.delete(&id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// POST /api/bookings/check
#[derive(Deserialize)]
pub struct CheckRequest {
    #[serde(flatten)]
    pub draft: BookingDraft,
    pub exclude_id: Option<String>,
}

#[derive(Serialize)]
pub struct CheckResponse {
    conflict: bool,
    with_booking_id: Option<String>,
}

pub async fn check_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    let request = body.draft.normalize()?;
    let result = state
        .admission
        .check(&request, body.exclude_id.as_deref())
        .await?;

    let response = match result {
        ConflictResult::NoConflict => CheckResponse {
            conflict: false,
            with_booking_id: None,
        },
        ConflictResult::Conflict { with_booking_id } => CheckResponse {
            conflict: true,
            with_booking_id: Some(with_booking_id),
        },
    };
    Ok(Json(response))
}
