use fritz_core::repository::ReservationRepository;
use fritz_core::{CoreError, CoreResult};
use fritz_shared::BookedSeat;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct BookingHistory {
    pub booking_code: String,
    pub reservations: Vec<BookedSeat>,
    pub total_price: i64,
}

/// Read side of confirmed bookings, grouped by booking code.
pub struct BookingLedger {
    reservations: Arc<dyn ReservationRepository>,
}

impl BookingLedger {
    pub fn new(reservations: Arc<dyn ReservationRepository>) -> Self {
        Self { reservations }
    }

    pub async fn history(&self, booking_code: &str) -> CoreResult<BookingHistory> {
        let code = booking_code.trim();
        if code.is_empty() {
            return Err(CoreError::validation("booking_code must not be blank"));
        }

        let reservations = self.reservations.booking_group(code).await?;
        if reservations.is_empty() {
            return Err(CoreError::BookingNotFound(code.to_string()));
        }

        let total_price = reservations.iter().map(|r| r.price).sum();
        debug!("Booking {} spans {} seats", code, reservations.len());

        Ok(BookingHistory {
            booking_code: code.to_string(),
            reservations,
            total_price,
        })
    }
}
