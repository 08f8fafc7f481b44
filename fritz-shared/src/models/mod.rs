pub mod reservation;
pub mod train;

pub use reservation::{
    BookedSeat, Gender, OccupiedSeat, Passenger, Reservation, ReservationStatus, Seat,
    UnknownVariant,
};
pub use train::{FareSchedule, Stop, Train};
