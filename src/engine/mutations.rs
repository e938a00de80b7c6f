//! The write path the CRUD layer calls. Every method validates against the
//! committed state overlaid with the transaction's own staged records, then
//! stages a mutation record; the store and the cache are untouched until
//! [`Engine::commit`].

use ulid::Ulid;

use crate::limits::MAX_LINES_PER_BOOKING;
use crate::model::*;
use crate::txn::Txn;

use super::availability::committed_quantity;
use super::conflict::{first_conflict, validate_period};
use super::view::StagedView;
use super::{Engine, EngineError};

impl Engine {
    fn view<'a>(&'a self, txn: &'a Txn) -> StagedView<'a> {
        StagedView::new(&self.store, txn)
    }

    // ── Parks ────────────────────────────────────────────────

    pub fn create_park(&self, txn: &mut Txn, id: Ulid) -> Result<(), EngineError> {
        if self.view(txn).contains_park(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        txn.stage(Mutation::ParkCreated { id });
        Ok(())
    }

    /// Deleting a park cascades deletion of its materials, which in turn
    /// invalidates every booking that referenced them.
    pub fn delete_park(&self, txn: &mut Txn, id: Ulid) -> Result<(), EngineError> {
        let view = self.view(txn);
        if !view.contains_park(&id) {
            return Err(EngineError::NotFound(id));
        }
        let material_ids = view.materials_in_park(&id);
        txn.stage(Mutation::ParkDeleted { id, material_ids, at: self.now() });
        Ok(())
    }

    // ── Materials ────────────────────────────────────────────

    pub fn create_material(
        &self,
        txn: &mut Txn,
        id: Ulid,
        park_id: Ulid,
        stock_quantity: u32,
        out_of_order_quantity: u32,
    ) -> Result<(), EngineError> {
        let view = self.view(txn);
        if view.contains_material(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if !view.contains_park(&park_id) {
            return Err(EngineError::NotFound(park_id));
        }
        txn.stage(Mutation::MaterialCreated {
            material: Material {
                id,
                park_id,
                stock_quantity,
                out_of_order_quantity,
                deleted_at: None,
            },
        });
        Ok(())
    }

    pub fn update_material_stock(
        &self,
        txn: &mut Txn,
        id: Ulid,
        stock_quantity: u32,
        out_of_order_quantity: u32,
    ) -> Result<(), EngineError> {
        if !self.view(txn).contains_material(&id) {
            return Err(EngineError::NotFound(id));
        }
        txn.stage(Mutation::MaterialStockChanged { id, stock_quantity, out_of_order_quantity });
        Ok(())
    }

    pub fn soft_delete_material(&self, txn: &mut Txn, id: Ulid) -> Result<(), EngineError> {
        match self.view(txn).get_material(&id) {
            None => Err(EngineError::NotFound(id)),
            Some(m) if m.deleted_at.is_some() => Ok(()), // already gone
            Some(_) => {
                txn.stage(Mutation::MaterialSoftDeleted { id, at: self.now() });
                Ok(())
            }
        }
    }

    pub fn restore_material(&self, txn: &mut Txn, id: Ulid) -> Result<(), EngineError> {
        match self.view(txn).get_material(&id) {
            None => Err(EngineError::NotFound(id)),
            Some(m) if m.deleted_at.is_none() => Ok(()),
            Some(_) => {
                txn.stage(Mutation::MaterialRestored { id });
                Ok(())
            }
        }
    }

    pub fn delete_material(&self, txn: &mut Txn, id: Ulid) -> Result<(), EngineError> {
        if !self.view(txn).contains_material(&id) {
            return Err(EngineError::NotFound(id));
        }
        txn.stage(Mutation::MaterialDeleted { id });
        Ok(())
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn create_booking(
        &self,
        txn: &mut Txn,
        id: Ulid,
        mobilization_period: Period,
        operation_period: Period,
    ) -> Result<(), EngineError> {
        validate_period(&mobilization_period)?;
        validate_period(&operation_period)?;
        if self.view(txn).contains_booking(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        txn.stage(Mutation::BookingCreated {
            id,
            mobilization_period,
            operation_period,
            is_archived: false,
        });
        Ok(())
    }

    pub fn update_booking_periods(
        &self,
        txn: &mut Txn,
        id: Ulid,
        mobilization_period: Period,
        operation_period: Period,
    ) -> Result<(), EngineError> {
        validate_period(&mobilization_period)?;
        validate_period(&operation_period)?;
        let view = self.view(txn);
        let booking = view.get_booking(&id).ok_or(EngineError::NotFound(id))?;

        if self.config.strict_materials {
            for line in &booking.materials {
                self.check_not_overbooked(
                    &view,
                    &line.material_id,
                    &mobilization_period,
                    line.quantity,
                    &id,
                )?;
            }
        }

        txn.stage(Mutation::BookingPeriodChanged {
            id,
            old_mobilization: booking.mobilization_period,
            mobilization_period,
            operation_period,
        });
        Ok(())
    }

    pub fn soft_delete_booking(&self, txn: &mut Txn, id: Ulid) -> Result<(), EngineError> {
        let booking = self.view(txn).get_booking(&id).ok_or(EngineError::NotFound(id))?;
        if booking.is_deleted() {
            return Ok(());
        }
        txn.stage(Mutation::BookingSoftDeleted {
            id,
            period: booking.mobilization_period,
            at: self.now(),
        });
        Ok(())
    }

    pub fn restore_booking(&self, txn: &mut Txn, id: Ulid) -> Result<(), EngineError> {
        let booking = self.view(txn).get_booking(&id).ok_or(EngineError::NotFound(id))?;
        if !booking.is_deleted() {
            return Ok(());
        }
        txn.stage(Mutation::BookingRestored { id, period: booking.mobilization_period });
        Ok(())
    }

    pub fn delete_booking(&self, txn: &mut Txn, id: Ulid) -> Result<(), EngineError> {
        let booking = self.view(txn).get_booking(&id).ok_or(EngineError::NotFound(id))?;
        txn.stage(Mutation::BookingDeleted {
            id,
            period: booking.mobilization_period,
            was_soft_deleted: booking.is_deleted(),
        });
        Ok(())
    }

    pub fn set_booking_archived(
        &self,
        txn: &mut Txn,
        id: Ulid,
        archived: bool,
    ) -> Result<(), EngineError> {
        if !self.view(txn).contains_booking(&id) {
            return Err(EngineError::NotFound(id));
        }
        txn.stage(Mutation::BookingArchived { id, archived });
        Ok(())
    }

    // ── Material lines ───────────────────────────────────────

    /// Add or change the quantity requested by a booking for a material.
    pub fn set_material_line(
        &self,
        txn: &mut Txn,
        booking_id: Ulid,
        material_id: Ulid,
        quantity: u32,
    ) -> Result<(), EngineError> {
        if quantity == 0 {
            return Err(EngineError::LimitExceeded("line quantity must be positive"));
        }
        let view = self.view(txn);
        let booking = view
            .get_booking(&booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        if !view.contains_material(&material_id) {
            return Err(EngineError::NotFound(material_id));
        }
        if booking.line(&material_id).is_none() && booking.materials.len() >= MAX_LINES_PER_BOOKING
        {
            return Err(EngineError::LimitExceeded("too many lines on booking"));
        }

        if self.config.strict_materials {
            self.check_not_overbooked(
                &view,
                &material_id,
                &booking.mobilization_period,
                quantity,
                &booking_id,
            )?;
        }

        txn.stage(Mutation::LineSet { booking_id, material_id, quantity });
        Ok(())
    }

    pub fn remove_material_line(
        &self,
        txn: &mut Txn,
        booking_id: Ulid,
        material_id: Ulid,
    ) -> Result<(), EngineError> {
        let booking = self
            .view(txn)
            .get_booking(&booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        if booking.line(&material_id).is_none() {
            return Err(EngineError::NotFound(material_id));
        }
        txn.stage(Mutation::LineRemoved { booking_id, material_id });
        Ok(())
    }

    /// Record return inventory for one line.
    pub fn set_line_returned(
        &self,
        txn: &mut Txn,
        booking_id: Ulid,
        material_id: Ulid,
        quantity_returned: u32,
    ) -> Result<(), EngineError> {
        let booking = self
            .view(txn)
            .get_booking(&booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        let line = booking
            .line(&material_id)
            .ok_or(EngineError::NotFound(material_id))?;
        if quantity_returned > line.quantity {
            return Err(EngineError::LimitExceeded("returned more than requested"));
        }
        txn.stage(Mutation::LineReturned { booking_id, material_id, quantity_returned });
        Ok(())
    }

    // ── Assignments ──────────────────────────────────────────

    pub fn create_assignment(
        &self,
        txn: &mut Txn,
        id: Ulid,
        technician_id: Ulid,
        booking_id: Ulid,
        period: Period,
        role_id: Option<Ulid>,
    ) -> Result<(), EngineError> {
        validate_period(&period)?;
        self.check_assignment_duration(&period)?;
        let view = self.view(txn);
        if view.contains_assignment(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if !view.contains_booking(&booking_id) {
            return Err(EngineError::NotFound(booking_id));
        }
        if self.config.strict_assignments {
            check_no_assignment_conflict(&view, &technician_id, &period, None)?;
        }
        txn.stage(Mutation::AssignmentCreated { id, technician_id, booking_id, period, role_id });
        Ok(())
    }

    pub fn update_assignment_period(
        &self,
        txn: &mut Txn,
        id: Ulid,
        period: Period,
    ) -> Result<(), EngineError> {
        validate_period(&period)?;
        self.check_assignment_duration(&period)?;
        let view = self.view(txn);
        let assignment = view.get_assignment(&id).ok_or(EngineError::NotFound(id))?;
        if self.config.strict_assignments {
            check_no_assignment_conflict(&view, &assignment.technician_id, &period, Some(&id))?;
        }
        txn.stage(Mutation::AssignmentPeriodChanged { id, period });
        Ok(())
    }

    /// Change or clear an assignment's role. Reassigning to a role the event
    /// has not seen yet upserts it into the event's position list, exactly
    /// like assignment creation does.
    pub fn update_assignment_role(
        &self,
        txn: &mut Txn,
        id: Ulid,
        role_id: Option<Ulid>,
    ) -> Result<(), EngineError> {
        if !self.view(txn).contains_assignment(&id) {
            return Err(EngineError::NotFound(id));
        }
        txn.stage(Mutation::AssignmentRoleChanged { id, role_id });
        Ok(())
    }

    pub fn delete_assignment(&self, txn: &mut Txn, id: Ulid) -> Result<(), EngineError> {
        if !self.view(txn).contains_assignment(&id) {
            return Err(EngineError::NotFound(id));
        }
        txn.stage(Mutation::AssignmentDeleted { id });
        Ok(())
    }

    // ── Shared checks ────────────────────────────────────────

    fn check_assignment_duration(&self, period: &Period) -> Result<(), EngineError> {
        let duration = period.duration_ms();
        if duration < self.config.min_assignment_duration_ms {
            return Err(EngineError::AssignmentTooShort {
                duration_ms: duration,
                minimum_ms: self.config.min_assignment_duration_ms,
            });
        }
        Ok(())
    }

    fn check_not_overbooked(
        &self,
        view: &StagedView<'_>,
        material_id: &Ulid,
        period: &Period,
        requested: u32,
        booking_id: &Ulid,
    ) -> Result<(), EngineError> {
        let material = view
            .get_material(material_id)
            .ok_or(EngineError::NotFound(*material_id))?;
        let candidates = view.bookings_referencing(material_id);
        let (committed, _) = committed_quantity(&candidates, material_id, period, Some(booking_id));
        let available = (material.usable_stock() as i64).saturating_sub_unsigned(committed);
        if (requested as i64) > available {
            return Err(EngineError::Overbooked {
                material_id: *material_id,
                requested,
                available,
            });
        }
        Ok(())
    }
}

fn check_no_assignment_conflict(
    view: &StagedView<'_>,
    technician_id: &Ulid,
    period: &Period,
    excluding: Option<&Ulid>,
) -> Result<(), EngineError> {
    let assignments = view.assignments_for(technician_id);
    if let Some(conflict) = first_conflict(&assignments, period, excluding) {
        return Err(EngineError::AssignmentConflict {
            technician_id: *technician_id,
            conflicting_assignment: conflict.id,
            period: conflict.period,
        });
    }
    Ok(())
}
