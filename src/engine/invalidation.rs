//! Cache invalidation coordinator: maps every committed mutation to the set
//! of derived-flag evictions it requires — the mutated booking itself plus
//! the "neighbor" bookings whose periods overlap it.
//!
//! All cache-store failures are logged and swallowed: correctness falls back
//! to "always recompute", a mutation never fails because the cache could not
//! be cleared.

use std::collections::HashSet;

use ulid::Ulid;

use crate::cache::{EntityTag, FlagKey};
use crate::model::*;
use crate::observability;

use super::Engine;

/// Booking lifecycle transition, as seen by the invalidation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingMutationKind {
    Created,
    PeriodChanged,
    SoftDeleted,
    Restored,
    HardDeleted { was_soft_deleted: bool },
}

/// Material transition, as seen by the invalidation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialMutationKind {
    StockChanged,
    Restored,
    Deleted,
}

impl Engine {
    fn evict(&self, booking_id: Ulid, flag: DerivedFlag) {
        let key = FlagKey { booking_id, flag };
        match self.cache.delete(&key) {
            Ok(()) => {
                metrics::counter!(observability::FLAG_EVICTIONS_TOTAL).increment(1);
            }
            Err(e) => {
                tracing::warn!(%booking_id, ?flag, error = %e, "flag eviction failed, cache treated as empty");
                metrics::counter!(observability::CACHE_FAILURES_TOTAL).increment(1);
            }
        }
    }

    /// Evict the named derived-flag entries of one booking, or all of them.
    pub fn invalidate(&self, booking_id: &Ulid, flags: Option<&[DerivedFlag]>) {
        let flags = flags.unwrap_or(&DerivedFlag::ALL);
        for flag in flags {
            self.evict(*booking_id, *flag);
        }
    }

    /// Evict `MissingMaterials` on every other non-deleted booking whose
    /// period overlaps `old_period` or, when the period just changed,
    /// `new_period`. Neighbors lose only their material-dependent flag — a
    /// neighbor's change cannot affect their return state.
    pub fn invalidate_neighbors(
        &self,
        excluding: &Ulid,
        old_period: &Period,
        new_period: Option<&Period>,
    ) {
        let mut seen: HashSet<Ulid> = HashSet::new();
        for booking in self.store.bookings_overlapping(old_period, Some(excluding)) {
            seen.insert(booking.id);
        }
        if let Some(new_period) = new_period {
            for booking in self.store.bookings_overlapping(new_period, Some(excluding)) {
                seen.insert(booking.id);
            }
        }
        for id in seen {
            self.evict(id, DerivedFlag::MissingMaterials);
        }
    }

    /// Booking lifecycle row of the invalidation table.
    ///
    /// Soft-delete evicts the booking's own flags even though nothing reads
    /// them while deleted — a later restore must not find stale entries.
    pub fn on_booking_mutated(
        &self,
        booking_id: &Ulid,
        old_period: Option<&Period>,
        new_period: Option<&Period>,
        kind: BookingMutationKind,
    ) {
        if let BookingMutationKind::HardDeleted { was_soft_deleted: true } = kind {
            // The soft-deletion already evicted the flags and told the
            // neighbors; removing the row changes nothing they can observe.
            return;
        }

        self.invalidate(booking_id, None);

        match kind {
            BookingMutationKind::Created => {
                if let Some(period) = new_period {
                    self.invalidate_neighbors(booking_id, period, None);
                }
            }
            BookingMutationKind::PeriodChanged => {
                match (old_period, new_period) {
                    (Some(old), new) => self.invalidate_neighbors(booking_id, old, new),
                    (None, Some(new)) => self.invalidate_neighbors(booking_id, new, None),
                    (None, None) => {}
                }
            }
            BookingMutationKind::SoftDeleted
            | BookingMutationKind::Restored
            | BookingMutationKind::HardDeleted { .. } => {
                if let Some(period) = old_period.or(new_period) {
                    self.invalidate_neighbors(booking_id, period, None);
                }
            }
        }
    }

    /// A material line was added, changed, or removed on a booking. The
    /// booking loses both flags; other bookings are touched only when they
    /// reference the *same material* and overlap in time — period overlap
    /// alone is not enough to be affected.
    pub fn on_material_line_mutated(&self, booking_id: &Ulid, material_id: &Ulid) {
        self.invalidate(booking_id, None);

        let Some(booking) = self.store.get_booking(booking_id) else {
            return;
        };
        for other in self.store.bookings_referencing(material_id) {
            if other.id == *booking_id {
                continue;
            }
            if other.mobilization_period.overlaps(&booking.mobilization_period) {
                self.evict(other.id, DerivedFlag::MissingMaterials);
            }
        }
    }

    /// A material itself changed. Every booking referencing it is affected,
    /// whatever its period: stock changes touch the material-dependent flag
    /// only, restore/delete touch both.
    pub fn on_material_mutated(&self, material_id: &Ulid, kind: MaterialMutationKind) {
        let flags: &[DerivedFlag] = match kind {
            MaterialMutationKind::StockChanged => &[DerivedFlag::MissingMaterials],
            MaterialMutationKind::Restored | MaterialMutationKind::Deleted => &DerivedFlag::ALL,
        };
        for booking in self.store.bookings_referencing(material_id) {
            self.invalidate(&booking.id, Some(flags));
        }
    }

    /// Park deletion cascades over every material it held. Rather than
    /// enumerating each dependent key, bump the park generation tag: every
    /// cached flag written before the bump becomes a miss.
    pub fn on_park_deleted(&self, park_id: &Ulid) {
        tracing::debug!(%park_id, "park deleted, bumping generation tag");
        match self.cache.bump_generation(EntityTag::Park) {
            Ok(()) => {
                metrics::counter!(observability::GENERATION_BUMPS_TOTAL).increment(1);
            }
            Err(e) => {
                tracing::warn!(%park_id, error = %e, "generation bump failed, cache treated as empty");
                metrics::counter!(observability::CACHE_FAILURES_TOTAL).increment(1);
            }
        }
    }

    /// Dispatch one committed mutation record through the table above.
    /// Runs after every record of the transaction has been applied.
    pub(super) fn invalidate_for(&self, mutation: &Mutation) {
        match mutation {
            Mutation::ParkCreated { .. } | Mutation::BookingArchived { .. } => {}
            Mutation::ParkDeleted { id, .. } => self.on_park_deleted(id),
            // Nothing references a material that was just created.
            Mutation::MaterialCreated { .. } => {}
            Mutation::MaterialStockChanged { id, .. } => {
                self.on_material_mutated(id, MaterialMutationKind::StockChanged)
            }
            Mutation::MaterialSoftDeleted { id, .. } | Mutation::MaterialDeleted { id } => {
                self.on_material_mutated(id, MaterialMutationKind::Deleted)
            }
            Mutation::MaterialRestored { id } => {
                self.on_material_mutated(id, MaterialMutationKind::Restored)
            }
            Mutation::BookingCreated { id, mobilization_period, .. } => self.on_booking_mutated(
                id,
                None,
                Some(mobilization_period),
                BookingMutationKind::Created,
            ),
            Mutation::BookingPeriodChanged { id, old_mobilization, mobilization_period, .. } => {
                self.on_booking_mutated(
                    id,
                    Some(old_mobilization),
                    Some(mobilization_period),
                    BookingMutationKind::PeriodChanged,
                )
            }
            Mutation::BookingSoftDeleted { id, period, .. } => {
                self.on_booking_mutated(id, Some(period), None, BookingMutationKind::SoftDeleted)
            }
            Mutation::BookingRestored { id, period } => {
                self.on_booking_mutated(id, Some(period), None, BookingMutationKind::Restored)
            }
            Mutation::BookingDeleted { id, period, was_soft_deleted } => self.on_booking_mutated(
                id,
                Some(period),
                None,
                BookingMutationKind::HardDeleted { was_soft_deleted: *was_soft_deleted },
            ),
            Mutation::LineSet { booking_id, material_id, .. }
            | Mutation::LineRemoved { booking_id, material_id }
            | Mutation::LineReturned { booking_id, material_id, .. } => {
                self.on_material_line_mutated(booking_id, material_id)
            }
            // Role upserts are handled at apply time; assignments carry no
            // derived flags.
            Mutation::AssignmentCreated { .. }
            | Mutation::AssignmentPeriodChanged { .. }
            | Mutation::AssignmentRoleChanged { .. }
            | Mutation::AssignmentDeleted { .. } => {}
        }
    }
}
