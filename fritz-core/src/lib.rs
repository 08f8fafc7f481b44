pub mod batch;
pub mod repository;

use batch::{Clash, ConflictReason};
use fritz_catalog::FareError;
use serde::Serialize;

/// A seat that could not be claimed because another reservation holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictingSeat {
    pub seat_id: i64,
    pub seat_number: String,
    pub reason: ConflictReason,
}

fn conflict_message(seats: &[ConflictingSeat]) -> String {
    let numbers: Vec<&str> = seats.iter().map(|s| s.seat_number.as_str()).collect();
    let mut msg = format!("Seats already taken: {}", numbers.join(", "));
    if seats
        .iter()
        .any(|s| s.reason == ConflictReason::HeldUnderOtherCode)
    {
        msg.push_str(
            "; seat held under another hold code, pass the hold_code returned by hold to confirm it",
        );
    }
    msg
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("{}", conflict_message(.seats))]
    SeatConflict { seats: Vec<ConflictingSeat> },
    /// A booking code already names an earlier purchase.
    #[error("Booking code {0} is already in use")]
    BookingCodeTaken(String),
    #[error("Invalid fare data for train {train_id}: {source}")]
    InvalidFareInput {
        train_id: i64,
        #[source]
        source: FareError,
    },
    #[error("Booking not found: {0}")]
    BookingNotFound(String),
    #[error("Storage failure: {0}")]
    StorageFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::ValidationError(msg.into())
    }

    /// Builds a `SeatConflict`, looking up each seat's display number.
    pub fn seat_conflict<F>(clashes: Vec<Clash>, seat_number: F) -> Self
    where
        F: Fn(i64) -> Option<String>,
    {
        CoreError::SeatConflict {
            seats: clashes
                .into_iter()
                .map(|clash| ConflictingSeat {
                    seat_id: clash.seat_id,
                    seat_number: seat_number(clash.seat_id).unwrap_or_default(),
                    reason: clash.reason,
                })
                .collect(),
        }
    }

    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        CoreError::StorageFailure(err.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_every_seat() {
        let err = CoreError::SeatConflict {
            seats: vec![
                ConflictingSeat {
                    seat_id: 17,
                    seat_number: "A5".to_string(),
                    reason: ConflictReason::Confirmed,
                },
                ConflictingSeat {
                    seat_id: 18,
                    seat_number: "B5".to_string(),
                    reason: ConflictReason::Held,
                },
            ],
        };
        assert_eq!(err.to_string(), "Seats already taken: A5, B5");
    }

    #[test]
    fn test_conflict_on_foreign_hold_points_at_hold_code() {
        let err = CoreError::seat_conflict(
            vec![Clash { seat_id: 3, reason: ConflictReason::HeldUnderOtherCode }],
            |_| Some("C1".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Seats already taken: C1"));
        assert!(msg.contains("hold_code"));
    }

    #[test]
    fn test_storage_error_keeps_source() {
        let err = CoreError::storage("connection reset");
        assert!(matches!(err, CoreError::StorageFailure(_)));
        assert_eq!(err.to_string(), "Storage failure: connection reset");
    }
}
