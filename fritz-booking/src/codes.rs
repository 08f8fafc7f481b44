use uuid::Uuid;

/// Prefix reserved for placeholder codes written on held rows.
pub const HOLD_PREFIX: &str = "HOLD-";
pub const BOOKING_PREFIX: &str = "BK-";

/// Shared code for seats confirmed together. Random v4 UUIDs keep codes
/// unique no matter how many are issued within the same instant.
pub fn new_booking_code() -> String {
    format!("{}{}", BOOKING_PREFIX, upper_uuid())
}

pub fn new_hold_code() -> String {
    format!("{}{}", HOLD_PREFIX, upper_uuid())
}

pub fn is_hold_code(code: &str) -> bool {
    code.starts_with(HOLD_PREFIX)
}

fn upper_uuid() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}
