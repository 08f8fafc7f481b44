use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use fritz_booking::{
    ConfirmReceipt, ConfirmRequest, HoldReceipt, HoldRequest, ReleaseReceipt, ReleaseRequest,
};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reservations/hold", post(hold_seats))
        .route("/reservations/release", post(release_seats))
        .route("/reservations/confirm", post(confirm_seats))
}

async fn hold_seats(
    State(state): State<AppState>,
    Json(req): Json<HoldRequest>,
) -> Result<Json<HoldReceipt>, AppError> {
    Ok(Json(state.reservations.hold(req).await?))
}

async fn release_seats(
    State(state): State<AppState>,
    Json(req): Json<ReleaseRequest>,
) -> Result<Json<ReleaseReceipt>, AppError> {
    Ok(Json(state.reservations.release(req).await?))
}

async fn confirm_seats(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<(StatusCode, Json<ConfirmReceipt>), AppError> {
    let receipt = state.reservations.confirm(req).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
