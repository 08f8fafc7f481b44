use chrono::{NaiveDate, Utc};
use fritz_core::repository::{ReservationRepository, TimetableRepository};
use fritz_core::{CoreError, CoreResult};
use fritz_shared::{Gender, OccupiedSeat};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailabilitySummary {
    pub total: i64,
    pub occupied: i64,
    pub available: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatStatus {
    pub seat_id: i64,
    pub car_name: String,
    pub seat_number: String,
    pub occupied: bool,
    /// Only reported for occupied seats.
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatMap {
    pub train_id: i64,
    pub travel_date: NaiveDate,
    pub total: i64,
    pub available: i64,
    pub booked: i64,
    pub seats: Vec<SeatStatus>,
}

impl SeatMap {
    /// Seats grouped by car name, inventory order kept within each car.
    pub fn by_car(&self) -> BTreeMap<String, Vec<SeatStatus>> {
        let mut cars: BTreeMap<String, Vec<SeatStatus>> = BTreeMap::new();
        for seat in &self.seats {
            cars.entry(seat.car_name.clone()).or_default().push(seat.clone());
        }
        cars
    }
}

/// Free/occupied seats for a train on a travel date, derived from the
/// reservation table. Reads never block on in-flight holds.
pub struct SeatAvailabilityView {
    timetable: Arc<dyn TimetableRepository>,
    reservations: Arc<dyn ReservationRepository>,
}

impl SeatAvailabilityView {
    pub fn new(
        timetable: Arc<dyn TimetableRepository>,
        reservations: Arc<dyn ReservationRepository>,
    ) -> Self {
        Self {
            timetable,
            reservations,
        }
    }

    pub async fn summary(&self, train_id: i64, travel_date: NaiveDate) -> CoreResult<AvailabilitySummary> {
        let total = self.timetable.count_seats(train_id).await?;
        let occupied = self
            .reservations
            .occupancy(train_id, travel_date, Utc::now())
            .await?
            .len() as i64;

        Ok(AvailabilitySummary {
            total,
            occupied,
            available: (total - occupied).max(0),
        })
    }

    pub async fn seat_map(&self, train_id: i64, travel_date: NaiveDate) -> CoreResult<SeatMap> {
        if self.timetable.get_train(train_id).await?.is_none() {
            return Err(CoreError::validation(format!("Unknown train {}", train_id)));
        }

        let inventory = self.timetable.list_seats(train_id).await?;
        let occupancy: HashMap<i64, OccupiedSeat> = self
            .reservations
            .occupancy(train_id, travel_date, Utc::now())
            .await?
            .into_iter()
            .map(|o| (o.seat_id, o))
            .collect();

        let seats: Vec<SeatStatus> = inventory
            .into_iter()
            .map(|seat| {
                let occupant = occupancy.get(&seat.id);
                SeatStatus {
                    seat_id: seat.id,
                    car_name: seat.car_name,
                    seat_number: seat.seat_number,
                    occupied: occupant.is_some(),
                    gender: occupant.and_then(|o| o.gender),
                }
            })
            .collect();

        let total = seats.len() as i64;
        let booked = seats.iter().filter(|s| s.occupied).count() as i64;

        Ok(SeatMap {
            train_id,
            travel_date,
            total,
            available: total - booked,
            booked,
            seats,
        })
    }
}
