use chrono::{DateTime, Duration, NaiveDate, Utc};
use fritz_core::batch::{ReservationBatch, SeatChange, SeatTransition, WriteKind};
use fritz_core::repository::ReservationRepository;
use fritz_core::{CoreError, CoreResult};
use fritz_shared::{Gender, Passenger};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::codes;

const MAX_BOOKING_CODE_LEN: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct HoldPolicy {
    /// `None` keeps holds until they are released or confirmed.
    pub ttl: Option<Duration>,
}

impl HoldPolicy {
    /// Builds the policy from a configured TTL in seconds.
    pub fn from_ttl_seconds(secs: Option<u64>) -> CoreResult<Self> {
        let ttl = match secs {
            None => None,
            Some(0) => return Err(CoreError::validation("hold TTL must be at least one second")),
            Some(secs) => Some(
                i64::try_from(secs)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
                    .ok_or_else(|| {
                        CoreError::validation(format!("hold TTL of {} seconds is out of range", secs))
                    })?,
            ),
        };
        Ok(Self { ttl })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HoldRequest {
    pub train_id: i64,
    pub travel_date: NaiveDate,
    pub seat_ids: Vec<i64>,
    #[serde(default)]
    pub seat_gender_hints: HashMap<i64, Gender>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldReceipt {
    pub hold_code: String,
    pub held_seat_ids: Vec<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseRequest {
    pub travel_date: NaiveDate,
    pub seat_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseReceipt {
    pub released_seat_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    pub train_id: i64,
    pub travel_date: NaiveDate,
    pub seat_ids: Vec<i64>,
    /// One passenger per seat, in `seat_ids` order.
    pub passengers: Vec<Passenger>,
    pub total_price: i64,
    #[serde(default)]
    pub booking_code: Option<String>,
    /// Code returned by the hold being completed, if any.
    #[serde(default)]
    pub hold_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmReceipt {
    pub booking_code: String,
    pub seat_ids: Vec<i64>,
    pub price_per_seat: i64,
    /// Seats whose existing hold was confirmed in place.
    pub promoted_seat_ids: Vec<i64>,
}

/// Seat reservation state machine: Free → Held → Confirmed, Held → Free.
///
/// Every mutating call is turned into a single `ReservationBatch`; the
/// repository applies it atomically or not at all.
pub struct ReservationManager {
    reservations: Arc<dyn ReservationRepository>,
    policy: HoldPolicy,
}

impl ReservationManager {
    pub fn new(reservations: Arc<dyn ReservationRepository>, policy: HoldPolicy) -> Self {
        Self {
            reservations,
            policy,
        }
    }

    pub async fn hold(&self, req: HoldRequest) -> CoreResult<HoldReceipt> {
        validate_seat_ids(&req.seat_ids)?;
        if let Some(stray) = req
            .seat_gender_hints
            .keys()
            .find(|seat_id| !req.seat_ids.contains(seat_id))
        {
            return Err(CoreError::validation(format!(
                "Gender hint given for seat {} which is not being held",
                stray
            )));
        }

        let hold_code = codes::new_hold_code();
        let expires_at = self.policy.ttl.map(|ttl| Utc::now() + ttl);

        let batch = ReservationBatch {
            train_id: req.train_id,
            travel_date: req.travel_date,
            code: hold_code.clone(),
            claim: None,
            expires_at,
            changes: req
                .seat_ids
                .iter()
                .map(|&seat_id| SeatChange {
                    seat_id,
                    transition: SeatTransition::Hold {
                        gender: req.seat_gender_hints.get(&seat_id).copied(),
                    },
                })
                .collect(),
        };

        self.reservations
            .apply(&batch)
            .await
            .map_err(|e| log_failure("hold", &batch, e))?;

        info!(
            train_id = req.train_id,
            travel_date = %req.travel_date,
            "Seats {:?} held under {}",
            req.seat_ids,
            hold_code
        );

        Ok(HoldReceipt {
            hold_code,
            held_seat_ids: req.seat_ids,
            expires_at,
        })
    }

    /// Idempotent: free and confirmed seats are left as they are.
    pub async fn release(&self, req: ReleaseRequest) -> CoreResult<ReleaseReceipt> {
        if req.seat_ids.is_empty() {
            return Err(CoreError::validation("seat_ids must not be empty"));
        }

        let released_seat_ids = self
            .reservations
            .release(req.travel_date, &req.seat_ids)
            .await
            .map_err(|e| {
                error!("Release failed for {:?} on {}: {}", req.seat_ids, req.travel_date, e);
                e
            })?;

        info!(
            travel_date = %req.travel_date,
            "Released holds on {:?} (requested {:?})",
            released_seat_ids,
            req.seat_ids
        );

        Ok(ReleaseReceipt { released_seat_ids })
    }

    pub async fn confirm(&self, req: ConfirmRequest) -> CoreResult<ConfirmReceipt> {
        validate_seat_ids(&req.seat_ids)?;
        validate_passengers(&req)?;
        if req.total_price < 0 {
            return Err(CoreError::validation("total_price must not be negative"));
        }

        let booking_code = match req.booking_code.as_deref().map(str::trim) {
            Some(code) => {
                validate_booking_code(code)?;
                code.to_string()
            }
            None => codes::new_booking_code(),
        };

        // Remainder of an uneven split is not distributed.
        let price_per_seat = req.total_price / req.seat_ids.len() as i64;

        let batch = ReservationBatch {
            train_id: req.train_id,
            travel_date: req.travel_date,
            code: booking_code.clone(),
            claim: req.hold_code.as_deref().map(str::trim).map(str::to_string),
            expires_at: None,
            changes: req
                .seat_ids
                .iter()
                .zip(req.passengers.iter())
                .map(|(&seat_id, passenger)| SeatChange {
                    seat_id,
                    transition: SeatTransition::Confirm {
                        passenger: passenger.clone(),
                        price: price_per_seat,
                    },
                })
                .collect(),
        };

        let applied = self
            .reservations
            .apply(&batch)
            .await
            .map_err(|e| log_failure("confirm", &batch, e))?;

        let promoted_seat_ids: Vec<i64> = applied
            .iter()
            .filter(|a| matches!(a.kind, WriteKind::Promote { .. }))
            .map(|a| a.seat_id)
            .collect();

        info!(
            train_id = req.train_id,
            travel_date = %req.travel_date,
            "Booking {} confirmed for seats {:?} ({} from holds)",
            booking_code,
            req.seat_ids,
            promoted_seat_ids.len()
        );

        Ok(ConfirmReceipt {
            booking_code,
            seat_ids: req.seat_ids,
            price_per_seat,
            promoted_seat_ids,
        })
    }

    /// Frees every hold whose expiry has passed.
    pub async fn reclaim_expired(&self) -> CoreResult<u64> {
        let reclaimed = self.reservations.reclaim_expired_holds(Utc::now()).await?;
        if reclaimed > 0 {
            info!("Reclaimed {} expired holds", reclaimed);
        }
        Ok(reclaimed)
    }
}

fn log_failure(operation: &str, batch: &ReservationBatch, err: CoreError) -> CoreError {
    match &err {
        CoreError::SeatConflict { seats } => warn!(
            train_id = batch.train_id,
            travel_date = %batch.travel_date,
            "{} lost race for seats {:?}",
            operation,
            seats.iter().map(|s| s.seat_id).collect::<Vec<_>>()
        ),
        CoreError::ValidationError(msg) => warn!("{} rejected: {}", operation, msg),
        CoreError::BookingCodeTaken(code) => {
            warn!("{} rejected: code {} already in use", operation, code)
        }
        other => error!(
            train_id = batch.train_id,
            travel_date = %batch.travel_date,
            "{} rolled back: {}",
            operation,
            other
        ),
    }
    err
}

fn validate_seat_ids(seat_ids: &[i64]) -> CoreResult<()> {
    if seat_ids.is_empty() {
        return Err(CoreError::validation("seat_ids must not be empty"));
    }
    let mut seen = HashSet::with_capacity(seat_ids.len());
    if let Some(dup) = seat_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(CoreError::validation(format!("seat {} requested twice", dup)));
    }
    Ok(())
}

fn validate_passengers(req: &ConfirmRequest) -> CoreResult<()> {
    if req.passengers.len() != req.seat_ids.len() {
        return Err(CoreError::validation(format!(
            "{} passengers given for {} seats",
            req.passengers.len(),
            req.seat_ids.len()
        )));
    }
    for (index, passenger) in req.passengers.iter().enumerate() {
        if passenger.name.trim().is_empty() {
            return Err(CoreError::validation(format!("passenger {} has no name", index)));
        }
        if passenger.id_number.expose().trim().is_empty() {
            return Err(CoreError::validation(format!(
                "passenger {} has no id number",
                index
            )));
        }
    }
    Ok(())
}

fn validate_booking_code(code: &str) -> CoreResult<()> {
    if code.is_empty() {
        return Err(CoreError::validation("booking_code must not be blank"));
    }
    if code.len() > MAX_BOOKING_CODE_LEN
        || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(CoreError::validation(format!("malformed booking_code {}", code)));
    }
    if codes::is_hold_code(code) {
        return Err(CoreError::validation("booking_code must not use the hold prefix"));
    }
    Ok(())
}
