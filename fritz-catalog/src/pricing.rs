use fritz_shared::FareSchedule;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_ROUNDING_UNIT: i64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareConfig {
    /// Proportional fares are rounded up to a multiple of this amount.
    pub rounding_unit: i64,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            rounding_unit: DEFAULT_ROUNDING_UNIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FareError {
    #[error("Invalid fare input: {0}")]
    InvalidFareInput(String),
    #[error("Invalid fare config: {0}")]
    InvalidConfig(String),
}

/// Segment fare engine.
///
/// Fixed-fare trains charge their flat fare for any segment. Every other
/// train charges the full-route price in proportion to the segment's share
/// of the full-route duration, rounded up to the next rounding unit.
#[derive(Debug, Clone)]
pub struct FareCalculator {
    config: FareConfig,
}

impl FareCalculator {
    pub fn new(config: FareConfig) -> Result<Self, FareError> {
        if config.rounding_unit <= 0 {
            return Err(FareError::InvalidConfig(format!(
                "rounding_unit must be positive, got {}",
                config.rounding_unit
            )));
        }
        Ok(Self { config })
    }

    pub fn rounding_unit(&self) -> i64 {
        self.config.rounding_unit
    }

    pub fn segment_price(
        &self,
        schedule: &FareSchedule,
        segment_minutes: i32,
    ) -> Result<i64, FareError> {
        if schedule.is_fixed_fare {
            if schedule.fixed_fare < 0 {
                return Err(FareError::InvalidFareInput(format!(
                    "negative fixed fare {}",
                    schedule.fixed_fare
                )));
            }
            return Ok(schedule.fixed_fare);
        }

        if schedule.full_route_duration <= 0 {
            return Err(FareError::InvalidFareInput(format!(
                "full route duration must be positive, got {}",
                schedule.full_route_duration
            )));
        }
        if schedule.full_route_price < 0 {
            return Err(FareError::InvalidFareInput(format!(
                "negative full route price {}",
                schedule.full_route_price
            )));
        }
        if segment_minutes < 0 {
            return Err(FareError::InvalidFareInput(format!(
                "negative segment duration {}",
                segment_minutes
            )));
        }

        // ceil(segment / full * price / unit) * unit, without floating point
        let unit = i128::from(self.config.rounding_unit);
        let numerator = i128::from(segment_minutes) * i128::from(schedule.full_route_price);
        let denominator = i128::from(schedule.full_route_duration) * unit;
        let units = (numerator + denominator - 1) / denominator;

        i64::try_from(units * unit)
            .map_err(|_| FareError::InvalidFareInput("segment price overflows".to_string()))
    }
}

impl Default for FareCalculator {
    fn default() -> Self {
        Self {
            config: FareConfig::default(),
        }
    }
}

/// A travel duration split into whole hours and remaining minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationHm {
    pub hours: i64,
    pub minutes: i64,
}

impl DurationHm {
    /// Missing or negative durations format as zero.
    pub fn from_minutes(total: Option<i64>) -> Self {
        let total = total.unwrap_or(0).max(0);
        Self {
            hours: total / 60,
            minutes: total % 60,
        }
    }
}

impl fmt::Display for DurationHm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}j {}m", self.hours, self.minutes)
    }
}
