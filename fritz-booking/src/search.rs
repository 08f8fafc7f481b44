use chrono::{NaiveDate, NaiveTime};
use fritz_catalog::{resolve_segments, DurationHm, FareCalculator};
use fritz_core::repository::TimetableRepository;
use fritz_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::availability::SeatAvailabilityView;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub origin: String,
    pub destination: String,
    pub travel_date: NaiveDate,
}

/// One bookable train for a searched segment.
#[derive(Debug, Clone, Serialize)]
pub struct TrainOffer {
    pub train_id: i64,
    pub name: String,
    pub class: String,
    pub origin: String,
    pub destination: String,
    pub departure: Option<NaiveTime>,
    pub arrival: Option<NaiveTime>,
    pub price: i64,
    pub duration_minutes: i32,
    pub duration_hm: String,
    pub seats_available: i64,
}

pub struct SearchService {
    timetable: Arc<dyn TimetableRepository>,
    availability: Arc<SeatAvailabilityView>,
    fares: FareCalculator,
}

impl SearchService {
    pub fn new(
        timetable: Arc<dyn TimetableRepository>,
        availability: Arc<SeatAvailabilityView>,
        fares: FareCalculator,
    ) -> Self {
        Self {
            timetable,
            availability,
            fares,
        }
    }

    /// Trains serving `origin` → `destination` in that direction, priced for
    /// the segment. Results are unordered.
    pub async fn search(&self, query: &SearchQuery) -> CoreResult<Vec<TrainOffer>> {
        let origin = query.origin.trim();
        let destination = query.destination.trim();
        if origin.is_empty() || destination.is_empty() {
            return Err(CoreError::validation("origin and destination are required"));
        }

        let pairs = self.timetable.stop_pairs(origin, destination).await?;
        let segments = resolve_segments(pairs);
        debug!(
            "{} trains serve {} -> {} on {}",
            segments.len(),
            origin,
            destination,
            query.travel_date
        );

        let mut offers = Vec::with_capacity(segments.len());
        for segment in segments {
            let train = &segment.train;
            let price = self
                .fares
                .segment_price(&train.fare_schedule(), segment.duration_minutes)
                .map_err(|source| {
                    error!(
                        target: "data_integrity",
                        train_id = train.id,
                        "Fare metadata rejected: {}",
                        source
                    );
                    CoreError::InvalidFareInput {
                        train_id: train.id,
                        source,
                    }
                })?;

            let availability = self.availability.summary(train.id, query.travel_date).await?;

            offers.push(TrainOffer {
                train_id: train.id,
                name: train.name.clone(),
                class: train.class.clone(),
                origin: segment.origin_code.clone(),
                destination: segment.destination_code.clone(),
                departure: segment.departure_time,
                arrival: segment.arrival_time,
                price,
                duration_minutes: segment.duration_minutes,
                duration_hm: DurationHm::from_minutes(Some(i64::from(segment.duration_minutes)))
                    .to_string(),
                seats_available: availability.available,
            });
        }

        Ok(offers)
    }
}
