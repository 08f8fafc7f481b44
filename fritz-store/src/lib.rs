pub mod app_config;
pub mod database;
pub mod memory;
pub mod reservation_repo;
pub mod timetable_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use memory::InMemoryStore;
pub use reservation_repo::PostgresReservationRepository;
pub use timetable_repo::PostgresTimetableRepository;
