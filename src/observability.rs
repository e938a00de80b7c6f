//! Metric names. Recorded with the `metrics` facade; the host process picks
//! the exporter.

/// Counter: derived-flag reads served from cache. Labels: flag.
pub const FLAG_CACHE_HITS_TOTAL: &str = "gearbook_flag_cache_hits_total";

/// Counter: derived-flag reads that recomputed. Labels: flag.
pub const FLAG_CACHE_MISSES_TOTAL: &str = "gearbook_flag_cache_misses_total";

/// Counter: cache entries evicted by the invalidation coordinator.
pub const FLAG_EVICTIONS_TOTAL: &str = "gearbook_flag_evictions_total";

/// Counter: generation-tag bumps (wide invalidations).
pub const GENERATION_BUMPS_TOTAL: &str = "gearbook_generation_bumps_total";

/// Counter: cache-store failures swallowed (treated as misses).
pub const CACHE_FAILURES_TOTAL: &str = "gearbook_cache_failures_total";

/// Histogram: derived-flag recompute duration in seconds. Labels: flag.
pub const FLAG_RECOMPUTE_DURATION_SECONDS: &str = "gearbook_flag_recompute_duration_seconds";

/// Counter: committed transactions.
pub const TXN_COMMITS_TOTAL: &str = "gearbook_txn_commits_total";

/// Counter: rolled-back transactions.
pub const TXN_ROLLBACKS_TOTAL: &str = "gearbook_txn_rollbacks_total";

/// Short metric label for a derived flag.
pub fn flag_label(flag: crate::model::DerivedFlag) -> &'static str {
    match flag {
        crate::model::DerivedFlag::MissingMaterials => "missing_materials",
        crate::model::DerivedFlag::NotReturnedMaterials => "not_returned_materials",
    }
}
