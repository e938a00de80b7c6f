//! Validation bounds applied on the write path.

use crate::model::Ms;

/// 2000-01-01T00:00:00Z — timestamps before this are rejected.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;

/// 2100-01-01T00:00:00Z — timestamps at or after this are rejected.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A single booking or assignment period may not exceed one year.
pub const MAX_PERIOD_DURATION_MS: Ms = 366 * 24 * 3_600_000;

/// Material lines carried by one booking.
pub const MAX_LINES_PER_BOOKING: usize = 10_000;

/// Default minimum assignable duration for a technician (15 minutes).
pub const DEFAULT_MIN_ASSIGNMENT_DURATION_MS: Ms = 15 * 60_000;
