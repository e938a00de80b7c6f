use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// One UTC day in milliseconds, used by full-day normalization.
pub const DAY_MS: Ms = 86_400_000;

/// Malformed interval: `start > end`. Raised at construction, never later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPeriod {
    pub start: Ms,
    pub end: Ms,
}

impl std::fmt::Display for InvalidPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid period: start {} > end {}", self.start, self.end)
    }
}

impl std::error::Error for InvalidPeriod {}

/// Half-open interval `[start, end)` with optional full-day normalization.
///
/// `start == end` is legal and represents "no time reserved": a zero-length
/// period overlaps nothing, not even itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: Ms,
    pub end: Ms,
    pub is_full_days: bool,
}

impl Period {
    pub fn new(start: Ms, end: Ms) -> Result<Self, InvalidPeriod> {
        if start > end {
            return Err(InvalidPeriod { start, end });
        }
        Ok(Self { start, end, is_full_days: false })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn is_zero_length(&self) -> bool {
        self.start == self.end
    }

    /// Half-open overlap: touching endpoints do not overlap, and a
    /// zero-length period overlaps nothing — not even a period containing
    /// its instant.
    pub fn overlaps(&self, other: &Period) -> bool {
        if self.is_zero_length() || other.is_zero_length() {
            return false;
        }
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_period(&self, other: &Period) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest period containing both. Display helper only — never use the
    /// result for overlap tests, the gap between disjoint inputs is included.
    pub fn merge(&self, other: &Period) -> Period {
        Period {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            is_full_days: self.is_full_days && other.is_full_days,
        }
    }

    /// Snap to UTC day boundaries: floor `start`, ceil `end`. Turning the
    /// flag off keeps the instants and only clears the marker.
    pub fn set_full_days(&self, full_days: bool) -> Period {
        if !full_days {
            return Period { is_full_days: false, ..*self };
        }
        let start = self.start.div_euclid(DAY_MS) * DAY_MS;
        let end = if self.end.rem_euclid(DAY_MS) == 0 {
            self.end
        } else {
            self.end.div_euclid(DAY_MS) * DAY_MS + DAY_MS
        };
        Period { start, end, is_full_days: true }
    }

    /// Expand both ends symmetrically. Used to build a fetch window with
    /// lookahead/lookbehind margin around a candidate period. A negative
    /// margin shrinks; shrinking past the midpoint collapses to a
    /// zero-length period rather than inverting the interval.
    pub fn offset(&self, margin: Ms) -> Period {
        let start = self.start - margin;
        Period {
            start,
            end: (self.end + margin).max(start),
            is_full_days: self.is_full_days,
        }
    }

    /// Punch `other` out of `self`. Returns 0, 1 or 2 remaining parts.
    pub fn subtract(&self, other: &Period) -> Vec<Period> {
        if !self.overlaps(other) {
            return vec![*self];
        }
        let mut parts = Vec::new();
        if self.start < other.start {
            parts.push(Period {
                start: self.start,
                end: other.start,
                is_full_days: self.is_full_days,
            });
        }
        if other.end < self.end {
            parts.push(Period {
                start: other.end,
                end: self.end,
                is_full_days: self.is_full_days,
            });
        }
        parts
    }
}

// ── Entities ─────────────────────────────────────────────────────

/// One requested material on a booking. `quantity` is always > 0;
/// `quantity_returned` grows during return inventory, up to `quantity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub material_id: Ulid,
    pub quantity: u32,
    pub quantity_returned: u32,
}

/// An event: a reservation of materials/technicians over a period.
/// Availability is computed against the mobilization period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub mobilization_period: Period,
    pub operation_period: Period,
    pub is_archived: bool,
    pub deleted_at: Option<Ms>,
    pub materials: Vec<MaterialLine>,
    /// Role ids present on the event, maintained by assignment upserts.
    pub positions: Vec<Ulid>,
}

impl Booking {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn line(&self, material_id: &Ulid) -> Option<&MaterialLine> {
        self.materials.iter().find(|l| l.material_id == *material_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: Ulid,
    pub park_id: Ulid,
    pub stock_quantity: u32,
    pub out_of_order_quantity: u32,
    pub deleted_at: Option<Ms>,
}

impl Material {
    /// Stock minus broken/out-of-order units, never negative.
    /// A soft-deleted material has no usable stock.
    pub fn usable_stock(&self) -> u32 {
        if self.deleted_at.is_some() {
            return 0;
        }
        self.stock_quantity.saturating_sub(self.out_of_order_quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Park {
    pub id: Ulid,
    pub deleted_at: Option<Ms>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Ulid,
    pub technician_id: Ulid,
    pub booking_id: Ulid,
    pub period: Period,
    pub role_id: Option<Ulid>,
    pub deleted_at: Option<Ms>,
}

impl Assignment {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// The cached derived booleans, one cache entry per booking per flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerivedFlag {
    MissingMaterials,
    NotReturnedMaterials,
}

impl DerivedFlag {
    pub const ALL: [DerivedFlag; 2] =
        [DerivedFlag::MissingMaterials, DerivedFlag::NotReturnedMaterials];
}

// ── Staged mutation records ──────────────────────────────────────

/// Flat record of a staged write — built by the mutation surface, applied to
/// the store at commit, then interpreted by the invalidation table. Old
/// periods needed by the table are captured at stage time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    ParkCreated {
        id: Ulid,
    },
    /// Cascades over the park's materials; their ids are captured when the
    /// deletion is staged.
    ParkDeleted {
        id: Ulid,
        material_ids: Vec<Ulid>,
        at: Ms,
    },
    MaterialCreated {
        material: Material,
    },
    MaterialStockChanged {
        id: Ulid,
        stock_quantity: u32,
        out_of_order_quantity: u32,
    },
    MaterialSoftDeleted {
        id: Ulid,
        at: Ms,
    },
    MaterialRestored {
        id: Ulid,
    },
    MaterialDeleted {
        id: Ulid,
    },
    BookingCreated {
        id: Ulid,
        mobilization_period: Period,
        operation_period: Period,
        is_archived: bool,
    },
    BookingPeriodChanged {
        id: Ulid,
        old_mobilization: Period,
        mobilization_period: Period,
        operation_period: Period,
    },
    BookingSoftDeleted {
        id: Ulid,
        period: Period,
        at: Ms,
    },
    BookingRestored {
        id: Ulid,
        period: Period,
    },
    BookingDeleted {
        id: Ulid,
        period: Period,
        was_soft_deleted: bool,
    },
    BookingArchived {
        id: Ulid,
        archived: bool,
    },
    LineSet {
        booking_id: Ulid,
        material_id: Ulid,
        quantity: u32,
    },
    LineRemoved {
        booking_id: Ulid,
        material_id: Ulid,
    },
    LineReturned {
        booking_id: Ulid,
        material_id: Ulid,
        quantity_returned: u32,
    },
    AssignmentCreated {
        id: Ulid,
        technician_id: Ulid,
        booking_id: Ulid,
        period: Period,
        role_id: Option<Ulid>,
    },
    AssignmentPeriodChanged {
        id: Ulid,
        period: Period,
    },
    AssignmentRoleChanged {
        id: Ulid,
        role_id: Option<Ulid>,
    },
    AssignmentDeleted {
        id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

/// Another booking holding part of the stock over the queried period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingRef {
    pub booking_id: Ulid,
    pub quantity: u32,
    pub period: Period,
}

/// Availability verdict for one material over one period. `available` may be
/// negative — over-booking is reported, never clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialAvailability {
    pub material_id: Ulid,
    pub stock_quantity: u32,
    pub out_of_order_quantity: u32,
    pub committed: u64,
    pub available: i64,
    pub requested_elsewhere: Vec<BookingRef>,
}

impl MaterialAvailability {
    pub fn usable_stock(&self) -> u32 {
        self.stock_quantity.saturating_sub(self.out_of_order_quantity)
    }

    pub fn is_overbooked(&self) -> bool {
        self.available < 0
    }
}
