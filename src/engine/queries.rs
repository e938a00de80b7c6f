use std::time::Instant;

use ulid::Ulid;

use crate::cache::FlagKey;
use crate::model::*;
use crate::observability;

use super::{Engine, EngineError};

impl Engine {
    /// Cache-through read of a derived flag: serve from cache, recompute from
    /// the committed relations on a miss, repopulate best-effort. A cache
    /// outage degrades to "always recompute", never to a failed read.
    pub fn derived_flag(&self, booking_id: &Ulid, flag: DerivedFlag) -> Result<bool, EngineError> {
        let key = FlagKey { booking_id: *booking_id, flag };
        let label = observability::flag_label(flag);

        match self.cache.get(&key) {
            Ok(Some(value)) => {
                metrics::counter!(observability::FLAG_CACHE_HITS_TOTAL, "flag" => label)
                    .increment(1);
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(%booking_id, ?flag, error = %e, "cache read failed, recomputing");
                metrics::counter!(observability::CACHE_FAILURES_TOTAL).increment(1);
            }
        }

        metrics::counter!(observability::FLAG_CACHE_MISSES_TOTAL, "flag" => label).increment(1);
        let started = Instant::now();
        let value = self.compute_flag(booking_id, flag)?;
        metrics::histogram!(observability::FLAG_RECOMPUTE_DURATION_SECONDS, "flag" => label)
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = self.cache.put(key, value) {
            tracing::warn!(%booking_id, ?flag, error = %e, "cache write failed, value not retained");
            metrics::counter!(observability::CACHE_FAILURES_TOTAL).increment(1);
        }
        Ok(value)
    }

    fn compute_flag(&self, booking_id: &Ulid, flag: DerivedFlag) -> Result<bool, EngineError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        match flag {
            DerivedFlag::MissingMaterials => self.compute_missing_materials(&booking),
            DerivedFlag::NotReturnedMaterials => Ok(self.compute_not_returned(&booking)),
        }
    }

    /// True when some line requests more than the stock left over by the
    /// other overlapping bookings.
    fn compute_missing_materials(&self, booking: &Booking) -> Result<bool, EngineError> {
        for line in &booking.materials {
            let availability = match self.available_quantity(
                &line.material_id,
                &booking.mobilization_period,
                Some(&booking.id),
            ) {
                Ok(a) => a,
                // A hard-deleted material cannot supply the line.
                Err(EngineError::NotFound(_)) => return Ok(true),
                Err(e) => return Err(e),
            };
            if (line.quantity as i64) > availability.available {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True once the mobilization period has ended with units still out.
    fn compute_not_returned(&self, booking: &Booking) -> bool {
        if booking.mobilization_period.end > self.now() {
            return false;
        }
        booking
            .materials
            .iter()
            .any(|line| line.quantity_returned < line.quantity)
    }
}
