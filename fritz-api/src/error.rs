use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fritz_core::batch::ConflictReason;
use fritz_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError {
        message: String,
        seat_ids: Vec<i64>,
        seat_numbers: Vec<String>,
        reasons: Vec<ConflictReason>,
    },
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::ConflictError {
                message,
                seat_ids,
                seat_numbers,
                reasons,
            } => (
                StatusCode::CONFLICT,
                json!({
                    "error": message,
                    "conflicting_seat_ids": seat_ids,
                    "conflicting_seat_numbers": seat_numbers,
                    "conflict_reasons": reasons,
                }),
            ),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::BookingNotFound(code) => {
                AppError::NotFoundError(format!("Booking {} not found", code))
            }
            CoreError::SeatConflict { ref seats } => AppError::ConflictError {
                message: err.to_string(),
                seat_ids: seats.iter().map(|s| s.seat_id).collect(),
                seat_numbers: seats.iter().map(|s| s.seat_number.clone()).collect(),
                reasons: seats.iter().map(|s| s.reason).collect(),
            },
            CoreError::BookingCodeTaken(_) => AppError::ConflictError {
                message: err.to_string(),
                seat_ids: Vec::new(),
                seat_numbers: Vec::new(),
                reasons: Vec::new(),
            },
            // already reported on the data_integrity target where it was raised
            CoreError::InvalidFareInput { .. } | CoreError::StorageFailure(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}
