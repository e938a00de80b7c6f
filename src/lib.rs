//! Availability and cache-consistency engine for rental-equipment bookings.
//!
//! Given an event (a reservation with a time period and a set of requested
//! materials/technicians), the engine answers whether enough physical stock
//! exists across all other overlapping events, detects technician
//! double-booking, and keeps the expensive derived flags
//! (`has_missing_materials`, `has_not_returned_materials`) cached, evicting
//! them on every mutation path — including transitively, for neighbor
//! bookings that did not themselves change. Invalidation runs strictly after
//! the transaction that triggered it commits.

pub mod cache;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod txn;

pub use cache::{CacheUnavailable, EntityTag, FlagCache, FlagKey, InMemoryFlagCache};
pub use engine::{BookingMutationKind, Engine, EngineConfig, EngineError, MaterialMutationKind};
pub use model::{
    Assignment, Booking, BookingRef, DerivedFlag, InvalidPeriod, Material, MaterialAvailability,
    MaterialLine, Ms, Mutation, Park, Period,
};
pub use txn::Txn;
