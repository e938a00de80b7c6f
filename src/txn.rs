//! Unit-of-work. Mutation methods stage records here; nothing reaches the
//! store or the cache until the engine commits. Dropping a `Txn` without
//! committing discards the staged writes *and* the after-commit hooks, so an
//! invalidation registered inside a rolled-back transaction never runs.

use crate::engine::Engine;
use crate::model::Mutation;

type CommitHook = Box<dyn FnOnce(&Engine) + Send>;

pub struct Txn {
    pub(crate) mutations: Vec<Mutation>,
    pub(crate) hooks: Vec<CommitHook>,
}

impl Default for Txn {
    fn default() -> Self {
        Self::new()
    }
}

impl Txn {
    pub fn new() -> Self {
        Self { mutations: Vec::new(), hooks: Vec::new() }
    }

    /// Register a callback that runs only after a successful commit, after
    /// the staged writes have been applied and invalidation has fired.
    pub fn on_commit(&mut self, hook: impl FnOnce(&Engine) + Send + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub(crate) fn stage(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.hooks.is_empty()
    }

    pub fn staged(&self) -> &[Mutation] {
        &self.mutations
    }
}

impl std::fmt::Debug for Txn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Txn")
            .field("mutations", &self.mutations)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
