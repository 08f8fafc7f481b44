use chrono::NaiveTime;
use fritz_shared::{Stop, Train};
use serde::{Deserialize, Serialize};

/// A train together with its calls at the requested origin and destination,
/// before direction has been checked.
#[derive(Debug, Clone)]
pub struct StopPair {
    pub train: Train,
    pub origin: Stop,
    pub destination: Stop,
}

/// The part of a train's route between boarding and alighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub train: Train,
    pub origin_code: String,
    pub destination_code: String,
    pub departure_time: Option<NaiveTime>,
    pub arrival_time: Option<NaiveTime>,
    pub duration_minutes: i32,
}

impl StopPair {
    /// Returns the segment when the train calls at the origin before the
    /// destination. A train running the opposite way yields `None`.
    pub fn resolve(self) -> Option<RouteSegment> {
        if self.origin.sequence >= self.destination.sequence {
            return None;
        }

        Some(RouteSegment {
            duration_minutes: self.destination.cumulative_duration
                - self.origin.cumulative_duration,
            departure_time: self.origin.departure_time,
            arrival_time: self.destination.arrival_time,
            origin_code: self.origin.station_code,
            destination_code: self.destination.station_code,
            train: self.train,
        })
    }
}

/// Picks a train's calls at `origin` and `destination` out of its stop list.
pub fn find_pair(train: &Train, stops: &[Stop], origin: &str, destination: &str) -> Option<StopPair> {
    let at = |code: &str| {
        stops
            .iter()
            .find(|stop| stop.train_id == train.id && stop.station_code == code)
            .cloned()
    };

    Some(StopPair {
        train: train.clone(),
        origin: at(origin)?,
        destination: at(destination)?,
    })
}

/// Resolves every candidate pair, dropping trains that do not qualify.
/// No route is an empty result, never an error.
pub fn resolve_segments<I>(pairs: I) -> Vec<RouteSegment>
where
    I: IntoIterator<Item = StopPair>,
{
    pairs.into_iter().filter_map(StopPair::resolve).collect()
}
