use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use fritz_booking::{SearchQuery, TrainOffer};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<NaiveDate>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/search", get(search_trains))
}

async fn search_trains(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<TrainOffer>>, AppError> {
    let (Some(origin), Some(destination)) = (params.from, params.to) else {
        return Err(AppError::ValidationError(
            "Query parameters 'from' and 'to' are required".to_string(),
        ));
    };

    let query = SearchQuery {
        origin,
        destination,
        travel_date: params.date.unwrap_or_else(|| Utc::now().date_naive()),
    };

    let offers = state.search.search(&query).await?;
    Ok(Json(offers))
}
