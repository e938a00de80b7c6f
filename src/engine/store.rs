use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

/// In-memory index implementing the persistence query surface: bookings by
/// overlap, bookings by referenced material, assignments by technician,
/// materials by park. The same contract is implementable over SQL; this is
/// the index the engine ships with.
pub struct InMemoryStore {
    parks: DashMap<Ulid, Park>,
    materials: DashMap<Ulid, Material>,
    bookings: DashMap<Ulid, Booking>,
    assignments: DashMap<Ulid, Assignment>,
    /// material id → booking ids carrying a line for it (soft-deleted
    /// bookings stay indexed, readers filter).
    material_to_bookings: DashMap<Ulid, Vec<Ulid>>,
    /// technician id → assignment ids.
    technician_to_assignments: DashMap<Ulid, Vec<Ulid>>,
    /// park id → material ids.
    park_to_materials: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            parks: DashMap::new(),
            materials: DashMap::new(),
            bookings: DashMap::new(),
            assignments: DashMap::new(),
            material_to_bookings: DashMap::new(),
            technician_to_assignments: DashMap::new(),
            park_to_materials: DashMap::new(),
        }
    }

    // ── Point lookups ────────────────────────────────────────

    pub fn get_park(&self, id: &Ulid) -> Option<Park> {
        self.parks.get(id).map(|e| e.value().clone())
    }

    pub fn get_material(&self, id: &Ulid) -> Option<Material> {
        self.materials.get(id).map(|e| e.value().clone())
    }

    pub fn get_booking(&self, id: &Ulid) -> Option<Booking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub fn get_assignment(&self, id: &Ulid) -> Option<Assignment> {
        self.assignments.get(id).map(|e| e.value().clone())
    }

    pub fn contains_park(&self, id: &Ulid) -> bool {
        self.parks.contains_key(id)
    }

    pub fn contains_material(&self, id: &Ulid) -> bool {
        self.materials.contains_key(id)
    }

    pub fn contains_booking(&self, id: &Ulid) -> bool {
        self.bookings.contains_key(id)
    }

    pub fn contains_assignment(&self, id: &Ulid) -> bool {
        self.assignments.contains_key(id)
    }

    // ── Query surface ────────────────────────────────────────

    /// Non-deleted bookings whose mobilization period overlaps `period`,
    /// excluding at most one booking id. A zero-length query period matches
    /// nothing.
    pub fn bookings_overlapping(&self, period: &Period, excluding: Option<&Ulid>) -> Vec<Booking> {
        self.bookings
            .iter()
            .filter(|e| {
                let b = e.value();
                !b.is_deleted()
                    && excluding != Some(&b.id)
                    && b.mobilization_period.overlaps(period)
            })
            .map(|e| e.value().clone())
            .collect()
    }

    /// Non-deleted bookings carrying a line for `material_id`.
    pub fn bookings_referencing(&self, material_id: &Ulid) -> Vec<Booking> {
        let ids = self
            .material_to_bookings
            .get(material_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.get_booking(id))
            .filter(|b| !b.is_deleted())
            .collect()
    }

    /// Non-deleted assignments of a technician, across all events.
    pub fn assignments_for(&self, technician_id: &Ulid) -> Vec<Assignment> {
        let ids = self
            .technician_to_assignments
            .get(technician_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.get_assignment(id))
            .filter(|a| !a.is_deleted())
            .collect()
    }

    /// All material ids in a park, soft-deleted included.
    pub fn materials_in_park(&self, park_id: &Ulid) -> Vec<Ulid> {
        self.park_to_materials
            .get(park_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    // ── Index maintenance ────────────────────────────────────

    fn index_line(&self, material_id: Ulid, booking_id: Ulid) {
        let mut ids = self.material_to_bookings.entry(material_id).or_default();
        if !ids.contains(&booking_id) {
            ids.push(booking_id);
        }
    }

    fn unindex_line(&self, material_id: &Ulid, booking_id: &Ulid) {
        if let Some(mut ids) = self.material_to_bookings.get_mut(material_id) {
            ids.retain(|id| id != booking_id);
        }
    }

    // ── Mutation application ─────────────────────────────────

    /// Apply one committed mutation record. Invalidation is not this layer's
    /// job — the coordinator runs after every record of the transaction has
    /// been applied.
    pub fn apply(&self, mutation: &Mutation) {
        match mutation {
            Mutation::ParkCreated { id } => {
                self.parks.insert(*id, Park { id: *id, deleted_at: None });
            }
            Mutation::ParkDeleted { id, material_ids, at } => {
                if let Some(mut park) = self.parks.get_mut(id) {
                    park.deleted_at = Some(*at);
                }
                for mid in material_ids {
                    if let Some(mut m) = self.materials.get_mut(mid) {
                        m.deleted_at = Some(*at);
                    }
                }
            }
            Mutation::MaterialCreated { material } => {
                self.park_to_materials
                    .entry(material.park_id)
                    .or_default()
                    .push(material.id);
                self.materials.insert(material.id, material.clone());
            }
            Mutation::MaterialStockChanged { id, stock_quantity, out_of_order_quantity } => {
                if let Some(mut m) = self.materials.get_mut(id) {
                    m.stock_quantity = *stock_quantity;
                    m.out_of_order_quantity = *out_of_order_quantity;
                }
            }
            Mutation::MaterialSoftDeleted { id, at } => {
                if let Some(mut m) = self.materials.get_mut(id) {
                    m.deleted_at = Some(*at);
                }
            }
            Mutation::MaterialRestored { id } => {
                if let Some(mut m) = self.materials.get_mut(id) {
                    m.deleted_at = None;
                }
            }
            Mutation::MaterialDeleted { id } => {
                if let Some((_, m)) = self.materials.remove(id) {
                    if let Some(mut ids) = self.park_to_materials.get_mut(&m.park_id) {
                        ids.retain(|mid| mid != id);
                    }
                }
            }
            Mutation::BookingCreated { id, mobilization_period, operation_period, is_archived } => {
                self.bookings.insert(
                    *id,
                    Booking {
                        id: *id,
                        mobilization_period: *mobilization_period,
                        operation_period: *operation_period,
                        is_archived: *is_archived,
                        deleted_at: None,
                        materials: Vec::new(),
                        positions: Vec::new(),
                    },
                );
            }
            Mutation::BookingPeriodChanged { id, mobilization_period, operation_period, .. } => {
                if let Some(mut b) = self.bookings.get_mut(id) {
                    b.mobilization_period = *mobilization_period;
                    b.operation_period = *operation_period;
                }
            }
            Mutation::BookingSoftDeleted { id, at, .. } => {
                if let Some(mut b) = self.bookings.get_mut(id) {
                    b.deleted_at = Some(*at);
                }
            }
            Mutation::BookingRestored { id, .. } => {
                if let Some(mut b) = self.bookings.get_mut(id) {
                    b.deleted_at = None;
                }
            }
            Mutation::BookingDeleted { id, .. } => {
                if let Some((_, b)) = self.bookings.remove(id) {
                    for line in &b.materials {
                        self.unindex_line(&line.material_id, id);
                    }
                }
            }
            Mutation::BookingArchived { id, archived } => {
                if let Some(mut b) = self.bookings.get_mut(id) {
                    b.is_archived = *archived;
                }
            }
            Mutation::LineSet { booking_id, material_id, quantity } => {
                if let Some(mut b) = self.bookings.get_mut(booking_id) {
                    match b.materials.iter_mut().find(|l| l.material_id == *material_id) {
                        Some(line) => line.quantity = *quantity,
                        None => b.materials.push(MaterialLine {
                            material_id: *material_id,
                            quantity: *quantity,
                            quantity_returned: 0,
                        }),
                    }
                }
                self.index_line(*material_id, *booking_id);
            }
            Mutation::LineRemoved { booking_id, material_id } => {
                if let Some(mut b) = self.bookings.get_mut(booking_id) {
                    b.materials.retain(|l| l.material_id != *material_id);
                }
                self.unindex_line(material_id, booking_id);
            }
            Mutation::LineReturned { booking_id, material_id, quantity_returned } => {
                if let Some(mut b) = self.bookings.get_mut(booking_id)
                    && let Some(line) =
                        b.materials.iter_mut().find(|l| l.material_id == *material_id)
                {
                    line.quantity_returned = (*quantity_returned).min(line.quantity);
                }
            }
            Mutation::AssignmentCreated { id, technician_id, booking_id, period, role_id } => {
                self.assignments.insert(
                    *id,
                    Assignment {
                        id: *id,
                        technician_id: *technician_id,
                        booking_id: *booking_id,
                        period: *period,
                        role_id: *role_id,
                        deleted_at: None,
                    },
                );
                self.technician_to_assignments
                    .entry(*technician_id)
                    .or_default()
                    .push(*id);
                // Role upsert: the event's position list gains the role if it
                // is not already present. Idempotent, never removes.
                if let Some(role) = role_id
                    && let Some(mut b) = self.bookings.get_mut(booking_id)
                    && !b.positions.contains(role)
                {
                    b.positions.push(*role);
                }
            }
            Mutation::AssignmentPeriodChanged { id, period } => {
                if let Some(mut a) = self.assignments.get_mut(id) {
                    a.period = *period;
                }
            }
            Mutation::AssignmentRoleChanged { id, role_id } => {
                // Capture the event id and drop the assignment guard before
                // touching the bookings map.
                let booking_id = match self.assignments.get_mut(id) {
                    Some(mut a) => {
                        a.role_id = *role_id;
                        a.booking_id
                    }
                    None => return,
                };
                if let Some(role) = role_id
                    && let Some(mut b) = self.bookings.get_mut(&booking_id)
                    && !b.positions.contains(role)
                {
                    b.positions.push(*role);
                }
            }
            Mutation::AssignmentDeleted { id } => {
                if let Some((_, a)) = self.assignments.remove(id) {
                    if let Some(mut ids) =
                        self.technician_to_assignments.get_mut(&a.technician_id)
                    {
                        ids.retain(|aid| aid != id);
                    }
                }
            }
        }
    }
}
