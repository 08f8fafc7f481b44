//! All-or-nothing reservation writes.
//!
//! A `ReservationBatch` describes every seat a Hold or Confirm request
//! touches. Repositories lock the batch's (seat, date) keys, load the active
//! rows for those keys and hand them to [`plan`], which decides per seat
//! whether to insert, promote a held row, or reject the whole batch.

use chrono::{DateTime, NaiveDate, Utc};
use fritz_shared::{Gender, Passenger, ReservationStatus};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub enum SeatTransition {
    Hold { gender: Option<Gender> },
    Confirm { passenger: Passenger, price: i64 },
}

impl SeatTransition {
    pub fn target_status(&self) -> ReservationStatus {
        match self {
            SeatTransition::Hold { .. } => ReservationStatus::Held,
            SeatTransition::Confirm { .. } => ReservationStatus::Confirmed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeatChange {
    pub seat_id: i64,
    pub transition: SeatTransition,
}

#[derive(Debug, Clone)]
pub struct ReservationBatch {
    pub train_id: i64,
    pub travel_date: NaiveDate,
    /// Written to every row the batch touches: a hold code or a booking code.
    pub code: String,
    /// Held rows created under this hold code may be promoted by `Confirm`.
    pub claim: Option<String>,
    /// Expiry stamped on inserted held rows.
    pub expires_at: Option<DateTime<Utc>>,
    pub changes: Vec<SeatChange>,
}

impl ReservationBatch {
    /// Seat ids in ascending order without duplicates. Locks are taken in
    /// this order.
    pub fn lock_order(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.changes.iter().map(|c| c.seat_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// An active (held or confirmed) row found for one of the batch's keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRow {
    pub reservation_id: i64,
    pub seat_id: i64,
    pub status: ReservationStatus,
    pub booking_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    /// Update the held row in place.
    Promote { reservation_id: i64 },
}

#[derive(Debug, Clone, Copy)]
pub struct PlannedWrite<'a> {
    pub change: &'a SeatChange,
    pub kind: WriteKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub seat_id: i64,
    pub reservation_id: i64,
    pub status: ReservationStatus,
    pub kind: WriteKind,
}

/// Why a seat in a batch could not be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    Confirmed,
    Held,
    /// A confirm met a held row created under a different (or no) hold code.
    HeldUnderOtherCode,
    RepeatedInRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clash {
    pub seat_id: i64,
    pub reason: ConflictReason,
}

/// Decides the writes for a batch given the active rows on its keys.
///
/// Returns every clash (ascending by seat, one per seat) when any seat is
/// taken; the caller must then write nothing.
pub fn plan<'a>(
    batch: &'a ReservationBatch,
    active: &[ActiveRow],
) -> Result<Vec<PlannedWrite<'a>>, Vec<Clash>> {
    let mut seen = HashSet::new();
    let mut writes = Vec::with_capacity(batch.changes.len());
    let mut clashes = Vec::new();

    for change in &batch.changes {
        if !seen.insert(change.seat_id) {
            clashes.push(Clash {
                seat_id: change.seat_id,
                reason: ConflictReason::RepeatedInRequest,
            });
            continue;
        }

        match active.iter().find(|row| row.seat_id == change.seat_id) {
            None => writes.push(PlannedWrite {
                change,
                kind: WriteKind::Insert,
            }),
            Some(row) if can_promote(batch, change, row) => writes.push(PlannedWrite {
                change,
                kind: WriteKind::Promote {
                    reservation_id: row.reservation_id,
                },
            }),
            Some(row) => clashes.push(Clash {
                seat_id: change.seat_id,
                reason: clash_reason(change, row),
            }),
        }
    }

    if clashes.is_empty() {
        Ok(writes)
    } else {
        clashes.sort_by_key(|c| c.seat_id);
        clashes.dedup_by_key(|c| c.seat_id);
        Err(clashes)
    }
}

fn can_promote(batch: &ReservationBatch, change: &SeatChange, row: &ActiveRow) -> bool {
    matches!(change.transition, SeatTransition::Confirm { .. })
        && row.status == ReservationStatus::Held
        && batch.claim.as_deref() == Some(row.booking_code.as_str())
}

fn clash_reason(change: &SeatChange, row: &ActiveRow) -> ConflictReason {
    match (row.status, &change.transition) {
        (ReservationStatus::Confirmed, _) => ConflictReason::Confirmed,
        (ReservationStatus::Held, SeatTransition::Confirm { .. }) => {
            ConflictReason::HeldUnderOtherCode
        }
        (ReservationStatus::Held, SeatTransition::Hold { .. }) => ConflictReason::Held,
    }
}
