use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use fritz_booking::BookingHistory;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/bookings/{booking_code}", get(booking_history))
}

async fn booking_history(
    State(state): State<AppState>,
    Path(booking_code): Path<String>,
) -> Result<Json<BookingHistory>, AppError> {
    Ok(Json(state.ledger.history(&booking_code).await?))
}
