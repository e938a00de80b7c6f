//! Read view the mutation surface validates against: committed store state
//! with the transaction's own staged records replayed on top. Without the
//! overlay a multi-step transaction could not reference an entity it staged
//! one call earlier (park then material, booking then line, and so on).

use ulid::Ulid;

use crate::model::*;
use crate::txn::Txn;

use super::store::InMemoryStore;

pub(super) struct StagedView<'a> {
    store: &'a InMemoryStore,
    staged: &'a [Mutation],
}

impl<'a> StagedView<'a> {
    pub(super) fn new(store: &'a InMemoryStore, txn: &'a Txn) -> Self {
        Self { store, staged: txn.staged() }
    }

    pub(super) fn contains_park(&self, id: &Ulid) -> bool {
        self.store.contains_park(id)
            || self
                .staged
                .iter()
                .any(|m| matches!(m, Mutation::ParkCreated { id: p } if p == id))
    }

    /// The material as the transaction would commit it, or as the store holds
    /// it if no staged record touches it. Replays in staging order, the same
    /// order the store applies at commit.
    pub(super) fn get_material(&self, id: &Ulid) -> Option<Material> {
        let mut material = self.store.get_material(id);
        for record in self.staged {
            match record {
                Mutation::MaterialCreated { material: created } if created.id == *id => {
                    material = Some(created.clone());
                }
                Mutation::MaterialStockChanged {
                    id: mid,
                    stock_quantity,
                    out_of_order_quantity,
                } if mid == id => {
                    if let Some(m) = material.as_mut() {
                        m.stock_quantity = *stock_quantity;
                        m.out_of_order_quantity = *out_of_order_quantity;
                    }
                }
                Mutation::MaterialSoftDeleted { id: mid, at } if mid == id => {
                    if let Some(m) = material.as_mut() {
                        m.deleted_at = Some(*at);
                    }
                }
                Mutation::MaterialRestored { id: mid } if mid == id => {
                    if let Some(m) = material.as_mut() {
                        m.deleted_at = None;
                    }
                }
                Mutation::MaterialDeleted { id: mid } if mid == id => material = None,
                Mutation::ParkDeleted { material_ids, at, .. } if material_ids.contains(id) => {
                    if let Some(m) = material.as_mut() {
                        m.deleted_at = Some(*at);
                    }
                }
                _ => {}
            }
        }
        material
    }

    pub(super) fn contains_material(&self, id: &Ulid) -> bool {
        self.get_material(id).is_some()
    }

    pub(super) fn get_booking(&self, id: &Ulid) -> Option<Booking> {
        let mut booking = self.store.get_booking(id);
        for record in self.staged {
            match record {
                Mutation::BookingCreated {
                    id: bid,
                    mobilization_period,
                    operation_period,
                    is_archived,
                } if bid == id => {
                    booking = Some(Booking {
                        id: *bid,
                        mobilization_period: *mobilization_period,
                        operation_period: *operation_period,
                        is_archived: *is_archived,
                        deleted_at: None,
                        materials: Vec::new(),
                        positions: Vec::new(),
                    });
                }
                Mutation::BookingPeriodChanged {
                    id: bid,
                    mobilization_period,
                    operation_period,
                    ..
                } if bid == id => {
                    if let Some(b) = booking.as_mut() {
                        b.mobilization_period = *mobilization_period;
                        b.operation_period = *operation_period;
                    }
                }
                Mutation::BookingSoftDeleted { id: bid, at, .. } if bid == id => {
                    if let Some(b) = booking.as_mut() {
                        b.deleted_at = Some(*at);
                    }
                }
                Mutation::BookingRestored { id: bid, .. } if bid == id => {
                    if let Some(b) = booking.as_mut() {
                        b.deleted_at = None;
                    }
                }
                Mutation::BookingDeleted { id: bid, .. } if bid == id => booking = None,
                Mutation::BookingArchived { id: bid, archived } if bid == id => {
                    if let Some(b) = booking.as_mut() {
                        b.is_archived = *archived;
                    }
                }
                Mutation::LineSet { booking_id, material_id, quantity } if booking_id == id => {
                    if let Some(b) = booking.as_mut() {
                        match b.materials.iter_mut().find(|l| l.material_id == *material_id) {
                            Some(line) => line.quantity = *quantity,
                            None => b.materials.push(MaterialLine {
                                material_id: *material_id,
                                quantity: *quantity,
                                quantity_returned: 0,
                            }),
                        }
                    }
                }
                Mutation::LineRemoved { booking_id, material_id } if booking_id == id => {
                    if let Some(b) = booking.as_mut() {
                        b.materials.retain(|l| l.material_id != *material_id);
                    }
                }
                Mutation::LineReturned { booking_id, material_id, quantity_returned }
                    if booking_id == id =>
                {
                    if let Some(b) = booking.as_mut()
                        && let Some(line) =
                            b.materials.iter_mut().find(|l| l.material_id == *material_id)
                    {
                        line.quantity_returned = (*quantity_returned).min(line.quantity);
                    }
                }
                Mutation::AssignmentCreated { booking_id, role_id: Some(role), .. }
                    if booking_id == id =>
                {
                    if let Some(b) = booking.as_mut()
                        && !b.positions.contains(role)
                    {
                        b.positions.push(*role);
                    }
                }
                _ => {}
            }
        }
        booking
    }

    pub(super) fn contains_booking(&self, id: &Ulid) -> bool {
        self.get_booking(id).is_some()
    }

    pub(super) fn get_assignment(&self, id: &Ulid) -> Option<Assignment> {
        let mut assignment = self.store.get_assignment(id);
        for record in self.staged {
            match record {
                Mutation::AssignmentCreated {
                    id: aid,
                    technician_id,
                    booking_id,
                    period,
                    role_id,
                } if aid == id => {
                    assignment = Some(Assignment {
                        id: *aid,
                        technician_id: *technician_id,
                        booking_id: *booking_id,
                        period: *period,
                        role_id: *role_id,
                        deleted_at: None,
                    });
                }
                Mutation::AssignmentPeriodChanged { id: aid, period } if aid == id => {
                    if let Some(a) = assignment.as_mut() {
                        a.period = *period;
                    }
                }
                Mutation::AssignmentRoleChanged { id: aid, role_id } if aid == id => {
                    if let Some(a) = assignment.as_mut() {
                        a.role_id = *role_id;
                    }
                }
                Mutation::AssignmentDeleted { id: aid } if aid == id => assignment = None,
                _ => {}
            }
        }
        assignment
    }

    pub(super) fn contains_assignment(&self, id: &Ulid) -> bool {
        self.get_assignment(id).is_some()
    }

    pub(super) fn materials_in_park(&self, park_id: &Ulid) -> Vec<Ulid> {
        let mut ids = self.store.materials_in_park(park_id);
        for record in self.staged {
            match record {
                Mutation::MaterialCreated { material } if material.park_id == *park_id => {
                    if !ids.contains(&material.id) {
                        ids.push(material.id);
                    }
                }
                Mutation::MaterialDeleted { id } => ids.retain(|mid| mid != id),
                _ => {}
            }
        }
        ids
    }

    /// Non-deleted bookings carrying a line for `material_id`, staged line
    /// changes included. Feeds the strict over-booking check.
    pub(super) fn bookings_referencing(&self, material_id: &Ulid) -> Vec<Booking> {
        let mut ids: Vec<Ulid> = self
            .store
            .bookings_referencing(material_id)
            .iter()
            .map(|b| b.id)
            .collect();
        for record in self.staged {
            if let Mutation::LineSet { booking_id, material_id: mid, .. } = record
                && mid == material_id
                && !ids.contains(booking_id)
            {
                ids.push(*booking_id);
            }
        }
        ids.iter()
            .filter_map(|id| self.get_booking(id))
            .filter(|b| !b.is_deleted() && b.line(material_id).is_some())
            .collect()
    }

    /// Non-deleted assignments of a technician, staged ones included. Feeds
    /// the strict double-booking check.
    pub(super) fn assignments_for(&self, technician_id: &Ulid) -> Vec<Assignment> {
        let mut ids: Vec<Ulid> = self
            .store
            .assignments_for(technician_id)
            .iter()
            .map(|a| a.id)
            .collect();
        for record in self.staged {
            if let Mutation::AssignmentCreated { id, technician_id: tid, .. } = record
                && tid == technician_id
                && !ids.contains(id)
            {
                ids.push(*id);
            }
        }
        ids.iter()
            .filter_map(|id| self.get_assignment(id))
            .filter(|a| !a.is_deleted())
            .collect()
    }
}
