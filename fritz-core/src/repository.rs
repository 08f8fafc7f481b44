use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fritz_catalog::StopPair;
use fritz_shared::{BookedSeat, OccupiedSeat, Seat, Train};

use crate::batch::{AppliedChange, ReservationBatch};
use crate::CoreResult;

/// Read access to timetable and seat inventory reference data.
#[async_trait]
pub trait TimetableRepository: Send + Sync {
    /// Every train calling at both stations, regardless of direction.
    async fn stop_pairs(&self, origin: &str, destination: &str) -> CoreResult<Vec<StopPair>>;

    async fn get_train(&self, train_id: i64) -> CoreResult<Option<Train>>;

    /// Seat inventory ordered by car name, then seat id.
    async fn list_seats(&self, train_id: i64) -> CoreResult<Vec<Seat>>;

    async fn count_seats(&self, train_id: i64) -> CoreResult<i64>;
}

/// Owner of the reservation table.
///
/// Implementations keep all locking inside `apply`: the (seat, date) keys of
/// a batch are locked, re-checked and written as one all-or-nothing unit.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn apply(&self, batch: &ReservationBatch) -> CoreResult<Vec<AppliedChange>>;

    /// Deletes held rows for the given seats. Confirmed rows are never touched.
    /// Returns the seat ids whose hold was removed.
    async fn release(&self, travel_date: NaiveDate, seat_ids: &[i64]) -> CoreResult<Vec<i64>>;

    /// Seats with an active reservation for the train and date.
    async fn occupancy(
        &self,
        train_id: i64,
        travel_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<OccupiedSeat>>;

    /// Confirmed reservations sharing a booking code.
    async fn booking_group(&self, booking_code: &str) -> CoreResult<Vec<BookedSeat>>;

    /// Deletes held rows whose expiry has passed. Returns the number removed.
    async fn reclaim_expired_holds(&self, now: DateTime<Utc>) -> CoreResult<u64>;
}
