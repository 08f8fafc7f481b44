pub mod availability;
pub mod codes;
pub mod ledger;
pub mod manager;
pub mod search;

pub use availability::{AvailabilitySummary, SeatAvailabilityView, SeatMap, SeatStatus};
pub use ledger::{BookingHistory, BookingLedger};
pub use manager::{
    ConfirmReceipt, ConfirmRequest, HoldPolicy, HoldReceipt, HoldRequest, ReleaseReceipt,
    ReleaseRequest, ReservationManager,
};
pub use search::{SearchQuery, SearchService, TrainOffer};
