pub mod pricing;
pub mod route;

pub use pricing::{DurationHm, FareCalculator, FareConfig, FareError, DEFAULT_ROUNDING_UNIT};
pub use route::{find_pair, resolve_segments, RouteSegment, StopPair};
