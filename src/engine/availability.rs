use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

/// Sum the quantities the given bookings hold on `material_id` over `period`.
/// Callers pass pre-filtered, non-deleted bookings; exclusion of the booking
/// under test happens here so the math stays in one place.
pub fn committed_quantity(
    bookings: &[Booking],
    material_id: &Ulid,
    period: &Period,
    excluding: Option<&Ulid>,
) -> (u64, Vec<BookingRef>) {
    // Wider than the per-line quantity so the sum cannot wrap.
    let mut committed: u64 = 0;
    let mut refs: Vec<BookingRef> = Vec::new();

    for booking in bookings {
        if excluding == Some(&booking.id) {
            continue;
        }
        if !booking.mobilization_period.overlaps(period) {
            continue;
        }
        let Some(line) = booking.line(material_id) else {
            continue;
        };
        if line.quantity == 0 {
            continue;
        }
        committed += u64::from(line.quantity);
        refs.push(BookingRef {
            booking_id: booking.id,
            quantity: line.quantity,
            period: booking.mobilization_period,
        });
    }

    (committed, refs)
}

impl Engine {
    /// How much of a material is free over `period`, given every other
    /// overlapping, non-deleted booking.
    ///
    /// A booking checking its own availability must pass its id as
    /// `excluding` or its own request is double-counted. `available` can go
    /// negative — over-booking is reported, not clamped; the validation
    /// layer decides what to do with it.
    pub fn available_quantity(
        &self,
        material_id: &Ulid,
        period: &Period,
        excluding: Option<&Ulid>,
    ) -> Result<MaterialAvailability, EngineError> {
        let material = self
            .store
            .get_material(material_id)
            .ok_or(EngineError::NotFound(*material_id))?;

        // A zero-length period overlaps nothing, so committed stays 0 and
        // the full usable stock is reported.
        let candidates = self.store.bookings_referencing(material_id);
        let (committed, requested_elsewhere) =
            committed_quantity(&candidates, material_id, period, excluding);

        let usable = material.usable_stock() as i64;
        Ok(MaterialAvailability {
            material_id: *material_id,
            stock_quantity: material.stock_quantity,
            out_of_order_quantity: material.out_of_order_quantity,
            committed,
            available: usable.saturating_sub_unsigned(committed),
            requested_elsewhere,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(start: Ms, end: Ms) -> Period {
        Period::new(start, end).unwrap()
    }

    fn booking_with_line(period: Period, material_id: Ulid, quantity: u32) -> Booking {
        Booking {
            id: Ulid::new(),
            mobilization_period: period,
            operation_period: period,
            is_archived: false,
            deleted_at: None,
            materials: vec![MaterialLine { material_id, quantity, quantity_returned: 0 }],
            positions: Vec::new(),
        }
    }

    #[test]
    fn sums_only_overlapping_bookings() {
        let mid = Ulid::new();
        let bookings = vec![
            booking_with_line(p(100, 500), mid, 5),
            booking_with_line(p(300, 700), mid, 4),
            booking_with_line(p(900, 1000), mid, 7), // outside the window
        ];
        let (committed, refs) = committed_quantity(&bookings, &mid, &p(300, 500), None);
        assert_eq!(committed, 9);
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn excludes_the_booking_under_test() {
        let mid = Ulid::new();
        let a = booking_with_line(p(100, 500), mid, 5);
        let b = booking_with_line(p(300, 700), mid, 4);
        let b_id = b.id;
        let bookings = vec![a, b];
        let (committed, refs) =
            committed_quantity(&bookings, &mid, &p(300, 500), Some(&b_id));
        assert_eq!(committed, 5);
        assert_eq!(refs.len(), 1);
        assert_ne!(refs[0].booking_id, b_id);
    }

    #[test]
    fn ignores_other_materials() {
        let mid = Ulid::new();
        let other = Ulid::new();
        let bookings = vec![booking_with_line(p(100, 500), other, 5)];
        let (committed, refs) = committed_quantity(&bookings, &mid, &p(100, 500), None);
        assert_eq!(committed, 0);
        assert!(refs.is_empty());
    }

    #[test]
    fn committed_sum_survives_huge_quantities() {
        let mid = Ulid::new();
        let bookings = vec![
            booking_with_line(p(0, 1000), mid, 3_000_000_000),
            booking_with_line(p(0, 1000), mid, 3_000_000_000),
        ];
        let (committed, refs) = committed_quantity(&bookings, &mid, &p(0, 1000), None);
        assert_eq!(committed, 6_000_000_000);
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn zero_length_query_commits_nothing() {
        let mid = Ulid::new();
        let bookings = vec![booking_with_line(p(0, 1000), mid, 5)];
        let (committed, _) = committed_quantity(&bookings, &mid, &p(300, 300), None);
        assert_eq!(committed, 0);
    }

    #[test]
    fn touching_endpoint_does_not_commit() {
        let mid = Ulid::new();
        let bookings = vec![booking_with_line(p(100, 300), mid, 5)];
        let (committed, _) = committed_quantity(&bookings, &mid, &p(300, 500), None);
        assert_eq!(committed, 0);
    }
}
