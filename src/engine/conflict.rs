use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(super) fn validate_period(period: &Period) -> Result<(), EngineError> {
    use crate::limits::*;
    if period.start < MIN_VALID_TIMESTAMP_MS || period.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if period.duration_ms() > MAX_PERIOD_DURATION_MS {
        return Err(EngineError::LimitExceeded("period too wide"));
    }
    Ok(())
}

/// First non-deleted assignment overlapping `period`, skipping at most one
/// assignment id. Overlap is boolean, no tie-break is needed.
pub fn first_conflict<'a>(
    assignments: &'a [Assignment],
    period: &Period,
    excluding: Option<&Ulid>,
) -> Option<&'a Assignment> {
    assignments
        .iter()
        .filter(|a| excluding != Some(&a.id))
        .find(|a| a.period.overlaps(period))
}

impl Engine {
    /// Would `period` double-book the technician? Checks assignments across
    /// all events, the technician's own event included.
    pub fn has_assignment_conflict(
        &self,
        technician_id: &Ulid,
        period: &Period,
        excluding: Option<&Ulid>,
    ) -> bool {
        self.find_assignment_conflict(technician_id, period, excluding)
            .is_some()
    }

    /// Same test, reporting the conflicting assignment so callers can name
    /// the offending period in a validation message.
    pub fn find_assignment_conflict(
        &self,
        technician_id: &Ulid,
        period: &Period,
        excluding: Option<&Ulid>,
    ) -> Option<Assignment> {
        let assignments = self.store.assignments_for(technician_id);
        first_conflict(&assignments, period, excluding).cloned()
    }

    /// Gate for "can an assignment even start here": builds
    /// `[requested_start, requested_start + min_duration)` and applies the
    /// overlap test.
    pub fn minimum_period_available(
        &self,
        technician_id: &Ulid,
        requested_start: Ms,
        min_duration_ms: Ms,
    ) -> Result<bool, EngineError> {
        if min_duration_ms < 0 {
            return Err(EngineError::LimitExceeded("negative duration"));
        }
        let candidate = Period::new(requested_start, requested_start + min_duration_ms)?;
        Ok(!self.has_assignment_conflict(technician_id, &candidate, None))
    }
}
