use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::db::BookingStore;
use crate::errors::AppError;
use crate::models::{Booking, Room};
use crate::state::AppState;

// GET /api/rooms
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Room>>, AppError> {
    Ok(Json(state.store.list_rooms()?))
}

// POST /api/rooms
#[derive(Deserialize)]
pub struct CreateRoom {
    pub id: Option<String>,
    pub name: String,
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRoom>,
) -> Result<(StatusCode, Json<Room>), AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("room name must not be empty".to_string()));
    }
    let id = body
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let room = state
        .store
        .create_room(&id, name)?
        .ok_or_else(|| AppError::BadRequest(format!("room already exists: {id}")))?;
    tracing::info!(room_id = %room.id, "room created");
    Ok((StatusCode::CREATED, Json(room)))
}

// GET /api/rooms/:id/bookings
pub async fn room_bookings(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    if state.store.get_room(&room_id)?.is_none() {
        return Err(AppError::NotFound(format!("room {room_id}")));
    }
    Ok(Json(state.store.find_by_room(&room_id).await?))
}
