mod availability;
mod conflict;
mod error;
mod invalidation;
mod mutations;
mod queries;
mod store;
mod view;

pub use error::EngineError;
pub use invalidation::{BookingMutationKind, MaterialMutationKind};
pub use store::InMemoryStore;

use std::sync::Arc;

use crate::cache::{FlagCache, InMemoryFlagCache};
use crate::limits::DEFAULT_MIN_ASSIGNMENT_DURATION_MS;
use crate::model::Ms;
use crate::observability;
use crate::txn::Txn;

/// Policy switches the host decides once, instead of the engine guessing.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reject material writes that would over-book (`available < requested`).
    /// Off by default: reservations are advisory and over-capacity saves are
    /// allowed, the derived flag surfaces them.
    pub strict_materials: bool,
    /// Reject assignment writes that double-book a technician. On by default.
    pub strict_assignments: bool,
    /// Minimum assignable duration for a technician.
    pub min_assignment_duration_ms: Ms,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_materials: false,
            strict_assignments: true,
            min_assignment_duration_ms: DEFAULT_MIN_ASSIGNMENT_DURATION_MS,
        }
    }
}

/// The availability and cache-consistency engine. Owns the in-memory index
/// and the derived-flag cache; every write goes through a [`Txn`] so that
/// invalidation runs strictly after the staged records are applied.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) cache: Arc<dyn FlagCache>,
    pub(super) config: EngineConfig,
    clock: Box<dyn Fn() -> Ms + Send + Sync>,
}

impl Engine {
    pub fn new(cache: Arc<dyn FlagCache>, config: EngineConfig) -> Self {
        Self {
            store: InMemoryStore::new(),
            cache,
            config,
            clock: Box::new(conflict::now_ms),
        }
    }

    /// Engine with its bundled in-process cache and default policy.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryFlagCache::new()), EngineConfig::default())
    }

    /// Replace the wall clock. Hosts use this to freeze time in tests; the
    /// clock feeds `has_not_returned_materials` ("has the period ended").
    pub fn with_clock(mut self, clock: impl Fn() -> Ms + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn now(&self) -> Ms {
        (self.clock)()
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Unit of work ─────────────────────────────────────────

    pub fn begin(&self) -> Txn {
        Txn::new()
    }

    /// Apply every staged record to the store, then run the invalidation
    /// table for each, then the registered after-commit hooks. Invalidation
    /// never observes a half-applied transaction.
    pub fn commit(&self, txn: Txn) {
        let Txn { mutations, hooks } = txn;
        for mutation in &mutations {
            self.store.apply(mutation);
        }
        for mutation in &mutations {
            self.invalidate_for(mutation);
        }
        for hook in hooks {
            hook(self);
        }
        metrics::counter!(observability::TXN_COMMITS_TOTAL).increment(1);
    }

    /// Discard staged writes and hooks. Nothing reaches the store or the
    /// cache — a reader repopulating the cache concurrently keeps seeing the
    /// pre-transaction state, which is still correct.
    pub fn rollback(&self, txn: Txn) {
        tracing::debug!(staged = txn.mutations.len(), "transaction rolled back");
        drop(txn);
        metrics::counter!(observability::TXN_ROLLBACKS_TOTAL).increment(1);
    }

    /// Closure convenience: commit on `Ok`, roll back on `Err`.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Engine, &mut Txn) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut txn = self.begin();
        match f(self, &mut txn) {
            Ok(value) => {
                self.commit(txn);
                Ok(value)
            }
            Err(e) => {
                self.rollback(txn);
                Err(e)
            }
        }
    }
}
