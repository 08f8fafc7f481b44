use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::pii::Masked;

/// Physical seat inventory, generated once per train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub train_id: i64,
    pub car_name: String,
    pub seat_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Held,
    Confirmed,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Held => write!(f, "held"),
            ReservationStatus::Confirmed => write!(f, "confirmed"),
        }
    }
}

impl FromStr for ReservationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "held" => Ok(ReservationStatus::Held),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            other => Err(UnknownVariant {
                kind: "reservation status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

impl FromStr for Gender {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(UnknownVariant {
                kind: "gender",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Passenger details recorded when a seat is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    pub name: String,
    pub id_number: Masked<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
}

/// A claim on one seat for one travel date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub train_id: i64,
    pub travel_date: NaiveDate,
    pub seat_id: i64,
    pub booking_code: String,
    pub passenger_name: Option<String>,
    pub passenger_id_number: Option<Masked<String>>,
    pub price: i64,
    pub status: ReservationStatus,
    pub gender: Option<Gender>,
    pub created_at: DateTime<Utc>,
    /// Only set on held rows when a hold TTL is configured.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Whether this row currently blocks its (seat, date) key.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            ReservationStatus::Confirmed => true,
            ReservationStatus::Held => self.expires_at.map_or(true, |at| at > now),
        }
    }
}

/// Occupancy of a single seat on a travel date, as seen by read paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupiedSeat {
    pub seat_id: i64,
    pub status: ReservationStatus,
    pub gender: Option<Gender>,
}

/// A confirmed reservation joined with its seat and train descriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedSeat {
    pub reservation_id: i64,
    pub booking_code: String,
    pub train_id: i64,
    pub train_name: String,
    pub train_class: String,
    pub travel_date: NaiveDate,
    pub seat_id: i64,
    pub car_name: String,
    pub seat_number: String,
    pub passenger_name: Option<String>,
    pub passenger_id_number: Option<Masked<String>>,
    pub gender: Option<Gender>,
    pub price: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn held(expires_at: Option<DateTime<Utc>>) -> Reservation {
        Reservation {
            id: 1,
            train_id: 1,
            travel_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            seat_id: 17,
            booking_code: "HOLD-X".to_string(),
            passenger_name: None,
            passenger_id_number: None,
            price: 0,
            status: ReservationStatus::Held,
            gender: None,
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [ReservationStatus::Held, ReservationStatus::Confirmed] {
            assert_eq!(status.to_string().parse::<ReservationStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<ReservationStatus>().is_err());
    }

    #[test]
    fn test_expired_hold_is_not_active() {
        let now = Utc::now();
        assert!(held(None).is_active(now));
        assert!(held(Some(now + Duration::minutes(5))).is_active(now));
        assert!(!held(Some(now - Duration::seconds(1))).is_active(now));

        let mut confirmed = held(Some(now - Duration::minutes(5)));
        confirmed.status = ReservationStatus::Confirmed;
        assert!(confirmed.is_active(now));
    }

    #[test]
    fn test_passenger_gender_defaults_to_none() {
        let passenger: Passenger =
            serde_json::from_str(r#"{"name": "Siti", "id_number": "3174"}"#).unwrap();
        assert_eq!(passenger.gender, None);
        assert_eq!(passenger.id_number.expose(), "3174");
    }
}
