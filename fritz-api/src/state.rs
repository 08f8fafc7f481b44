use fritz_booking::{
    BookingLedger, HoldPolicy, ReservationManager, SearchService, SeatAvailabilityView,
};
use fritz_catalog::FareCalculator;
use fritz_core::repository::{ReservationRepository, TimetableRepository};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub availability: Arc<SeatAvailabilityView>,
    pub reservations: Arc<ReservationManager>,
    pub ledger: Arc<BookingLedger>,
}

impl AppState {
    pub fn new(
        timetable: Arc<dyn TimetableRepository>,
        reservations: Arc<dyn ReservationRepository>,
        fares: FareCalculator,
        holds: HoldPolicy,
    ) -> Self {
        let availability = Arc::new(SeatAvailabilityView::new(
            timetable.clone(),
            reservations.clone(),
        ));

        Self {
            search: Arc::new(SearchService::new(
                timetable,
                availability.clone(),
                fares,
            )),
            availability,
            reservations: Arc::new(ReservationManager::new(reservations.clone(), holds)),
            ledger: Arc::new(BookingLedger::new(reservations)),
        }
    }
}
