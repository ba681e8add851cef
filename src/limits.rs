//! Hard limits on everything a client can make the server hold or compute.

pub const MAX_FARMS: usize = 100_000;
pub const MAX_RESERVATIONS_PER_FARM: usize = 50_000;
pub const MAX_REVIEWS_PER_FARM: usize = 50_000;

pub const MAX_TITLE_LEN: usize = 256;
pub const MAX_LOCATION_LEN: usize = 256;
pub const MAX_GUEST_FIELD_LEN: usize = 256;
pub const MAX_PAYMENT_REF_LEN: usize = 256;
pub const MAX_COMMENT_LEN: usize = 1000;

pub const MAX_CAPACITY: u32 = 10_000;
pub const MAX_NIGHTLY_RATE: u64 = 1_000_000_000;
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Calendar dates outside these years are rejected before any arithmetic.
pub const MIN_VALID_YEAR: i32 = 2000;
pub const MAX_VALID_YEAR: i32 = 2200;

pub const DEFAULT_TOP_FARMS: usize = 5;
pub const MAX_TOP_FARMS: usize = 100;
pub const DEFAULT_REVENUE_MONTHS: u32 = 6;
pub const MAX_REVENUE_MONTHS: u32 = 120;
pub const DEFAULT_RECENT_RESERVATIONS: usize = 10;
pub const MAX_RECENT_RESERVATIONS: usize = 100;
