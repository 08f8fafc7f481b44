use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use fritz_shared::Gender;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SeatParams {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct SeatView {
    seat_id: i64,
    seat_number: String,
    occupied: bool,
    gender: Option<Gender>,
}

#[derive(Debug, Serialize)]
struct SeatListResponse {
    train_id: i64,
    travel_date: NaiveDate,
    total: i64,
    available: i64,
    booked: i64,
    per_car: BTreeMap<String, Vec<SeatView>>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/trains/{train_id}/seats", get(list_seats))
}

async fn list_seats(
    State(state): State<AppState>,
    Path(train_id): Path<i64>,
    Query(params): Query<SeatParams>,
) -> Result<Json<SeatListResponse>, AppError> {
    let travel_date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let map = state.availability.seat_map(train_id, travel_date).await?;

    let per_car = map
        .by_car()
        .into_iter()
        .map(|(car, seats)| {
            let seats = seats
                .into_iter()
                .map(|s| SeatView {
                    seat_id: s.seat_id,
                    seat_number: s.seat_number,
                    occupied: s.occupied,
                    gender: s.gender,
                })
                .collect();
            (car, seats)
        })
        .collect();

    Ok(Json(SeatListResponse {
        train_id: map.train_id,
        travel_date: map.travel_date,
        total: map.total,
        available: map.available,
        booked: map.booked,
        per_car,
    }))
}
