use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Every way an admission attempt can be turned down.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("invalid time: {0}")]
    InvalidTime(String),

    #[error("invalid booking request: {0}")]
    InvalidBookingRequest(String),

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("booking not found: {0}")]
    BookingNotFound(String),

    #[error("conflicts with booking {with_booking_id}")]
    Conflict { with_booking_id: String },

    /// A store failed or broke its contract. Nothing was persisted.
    #[error("store error: {0:#}")]
    Store(#[source] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("database error: {0:#}")]
    Database(#[from] anyhow::Error),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Admission(AdmissionError::InvalidTime(_))
            | AppError::Admission(AdmissionError::InvalidBookingRequest(_))
            | AppError::Admission(AdmissionError::Conflict { .. }) => StatusCode::BAD_REQUEST,
            AppError::Admission(AdmissionError::RoomNotFound(_))
            | AppError::Admission(AdmissionError::BookingNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Admission(AdmissionError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = match &self {
            AppError::Admission(AdmissionError::Conflict { with_booking_id }) => {
                serde_json::json!({ "error": self.to_string(), "with_booking_id": with_booking_id })
            }
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, axum::Json(body)).into_response()
    }
}
