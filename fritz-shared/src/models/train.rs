use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Timetable reference data for one train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Train {
    pub id: i64,
    pub name: String,
    pub class: String,
    /// Flat price regardless of the segment travelled.
    pub is_fixed_fare: bool,
    pub fixed_fare: i64,
    pub full_route_price: i64,
    /// Minutes from the first to the last stop.
    pub full_route_duration: i32,
}

impl Train {
    pub fn fare_schedule(&self) -> FareSchedule {
        FareSchedule {
            is_fixed_fare: self.is_fixed_fare,
            fixed_fare: self.fixed_fare,
            full_route_price: self.full_route_price,
            full_route_duration: self.full_route_duration,
        }
    }
}

/// The subset of a train's metadata the fare rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareSchedule {
    pub is_fixed_fare: bool,
    pub fixed_fare: i64,
    pub full_route_price: i64,
    pub full_route_duration: i32,
}

/// A station call on a train's route.
///
/// `sequence` is strictly increasing along the route. The cumulative fields
/// are measured from the first stop of the route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub train_id: i64,
    pub station_code: String,
    pub sequence: i32,
    /// Absent at the origin terminal.
    pub arrival_time: Option<NaiveTime>,
    /// Absent at the final terminal.
    pub departure_time: Option<NaiveTime>,
    pub cumulative_duration: i32,
    pub cumulative_price: i64,
}
