//! Derived-flag cache: key/tag-addressable store for the per-booking booleans.
//!
//! Keys are typed, never concatenated strings. Wide invalidations ("a park was
//! deleted") go through per-entity-type generation tags: bumping a tag makes
//! every entry written under the old generation a miss without enumerating
//! keys.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use ulid::Ulid;

use crate::model::DerivedFlag;

/// Cache store failure. Always non-fatal: the engine logs it and falls back
/// to "recompute everything", never fails the triggering mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheUnavailable(pub String);

impl std::fmt::Display for CacheUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cache unavailable: {}", self.0)
    }
}

impl std::error::Error for CacheUnavailable {}

/// Cache address of one derived flag of one booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagKey {
    pub booking_id: Ulid,
    pub flag: DerivedFlag,
}

/// Generation tag per entity type, for bulk invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityTag {
    Booking,
    Material,
    Park,
}

const TAG_COUNT: usize = 3;

impl EntityTag {
    fn index(self) -> usize {
        match self {
            EntityTag::Booking => 0,
            EntityTag::Material => 1,
            EntityTag::Park => 2,
        }
    }
}

/// Get/set/delete by key plus bulk invalidation by tag. Implementations over
/// an external store (memcached, redis) surface outages as `CacheUnavailable`;
/// the engine treats those as universal misses.
pub trait FlagCache: Send + Sync {
    fn get(&self, key: &FlagKey) -> Result<Option<bool>, CacheUnavailable>;
    fn put(&self, key: FlagKey, value: bool) -> Result<(), CacheUnavailable>;
    fn delete(&self, key: &FlagKey) -> Result<(), CacheUnavailable>;
    fn bump_generation(&self, tag: EntityTag) -> Result<(), CacheUnavailable>;
}

struct Entry {
    value: bool,
    /// Generations observed at write time; any advance makes the entry stale.
    snapshot: [u64; TAG_COUNT],
}

/// In-process implementation on `DashMap`. Never reports unavailability.
pub struct InMemoryFlagCache {
    entries: DashMap<FlagKey, Entry>,
    generations: [AtomicU64; TAG_COUNT],
}

impl Default for InMemoryFlagCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFlagCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            generations: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
        }
    }

    fn current_snapshot(&self) -> [u64; TAG_COUNT] {
        [
            self.generations[0].load(Ordering::Acquire),
            self.generations[1].load(Ordering::Acquire),
            self.generations[2].load(Ordering::Acquire),
        ]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FlagCache for InMemoryFlagCache {
    fn get(&self, key: &FlagKey) -> Result<Option<bool>, CacheUnavailable> {
        let snapshot = self.current_snapshot();
        let stale = match self.entries.get(key) {
            Some(entry) if entry.snapshot == snapshot => return Ok(Some(entry.value)),
            Some(_) => true,
            None => false,
        };
        if stale {
            // Stale generation — drop lazily, outside the shard guard.
            self.entries.remove(key);
        }
        Ok(None)
    }

    fn put(&self, key: FlagKey, value: bool) -> Result<(), CacheUnavailable> {
        let snapshot = self.current_snapshot();
        self.entries.insert(key, Entry { value, snapshot });
        Ok(())
    }

    fn delete(&self, key: &FlagKey) -> Result<(), CacheUnavailable> {
        self.entries.remove(key);
        Ok(())
    }

    fn bump_generation(&self, tag: EntityTag) -> Result<(), CacheUnavailable> {
        self.generations[tag.index()].fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(flag: DerivedFlag) -> FlagKey {
        FlagKey { booking_id: Ulid::new(), flag }
    }

    #[test]
    fn get_put_delete_roundtrip() {
        let cache = InMemoryFlagCache::new();
        let k = key(DerivedFlag::MissingMaterials);
        assert_eq!(cache.get(&k).unwrap(), None);
        cache.put(k, true).unwrap();
        assert_eq!(cache.get(&k).unwrap(), Some(true));
        cache.delete(&k).unwrap();
        assert_eq!(cache.get(&k).unwrap(), None);
    }

    #[test]
    fn keys_are_flag_scoped() {
        let cache = InMemoryFlagCache::new();
        let booking_id = Ulid::new();
        let missing = FlagKey { booking_id, flag: DerivedFlag::MissingMaterials };
        let returned = FlagKey { booking_id, flag: DerivedFlag::NotReturnedMaterials };
        cache.put(missing, true).unwrap();
        assert_eq!(cache.get(&returned).unwrap(), None);
    }

    #[test]
    fn generation_bump_invalidates_everything() {
        let cache = InMemoryFlagCache::new();
        let a = key(DerivedFlag::MissingMaterials);
        let b = key(DerivedFlag::NotReturnedMaterials);
        cache.put(a, false).unwrap();
        cache.put(b, true).unwrap();

        cache.bump_generation(EntityTag::Material).unwrap();
        assert_eq!(cache.get(&a).unwrap(), None);
        assert_eq!(cache.get(&b).unwrap(), None);
    }

    #[test]
    fn entries_written_after_bump_are_valid() {
        let cache = InMemoryFlagCache::new();
        cache.bump_generation(EntityTag::Park).unwrap();
        let k = key(DerivedFlag::MissingMaterials);
        cache.put(k, true).unwrap();
        assert_eq!(cache.get(&k).unwrap(), Some(true));
    }

    #[test]
    fn stale_entries_are_dropped_lazily() {
        let cache = InMemoryFlagCache::new();
        let k = key(DerivedFlag::MissingMaterials);
        cache.put(k, true).unwrap();
        cache.bump_generation(EntityTag::Booking).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&k).unwrap(), None);
        assert_eq!(cache.len(), 0);
    }
}
