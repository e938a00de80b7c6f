use ulid::Ulid;

use crate::model::{InvalidPeriod, Ms, Period};

#[derive(Debug)]
pub enum EngineError {
    InvalidPeriod(InvalidPeriod),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Strict-materials policy only: the requested quantity exceeds what is
    /// available over the period. On the query path over-booking is data,
    /// not an error.
    Overbooked {
        material_id: Ulid,
        requested: u32,
        available: i64,
    },
    /// Strict-assignments policy: the technician already has an overlapping
    /// assignment.
    AssignmentConflict {
        technician_id: Ulid,
        conflicting_assignment: Ulid,
        period: Period,
    },
    AssignmentTooShort {
        duration_ms: Ms,
        minimum_ms: Ms,
    },
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidPeriod(e) => write!(f, "{e}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Overbooked { material_id, requested, available } => {
                write!(
                    f,
                    "material {material_id} over-booked: requested {requested}, available {available}"
                )
            }
            EngineError::AssignmentConflict { technician_id, conflicting_assignment, period } => {
                write!(
                    f,
                    "technician {technician_id} already assigned over [{}, {}) (assignment {conflicting_assignment})",
                    period.start, period.end
                )
            }
            EngineError::AssignmentTooShort { duration_ms, minimum_ms } => {
                write!(
                    f,
                    "assignment duration {duration_ms}ms below minimum {minimum_ms}ms"
                )
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<InvalidPeriod> for EngineError {
    fn from(e: InvalidPeriod) -> Self {
        EngineError::InvalidPeriod(e)
    }
}
