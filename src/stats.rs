//! The statistics dictionary exposed by [`crate::Manager::statistics`].

/// Snapshot of manager-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    /// Number of declared variables.
    pub n_vars: usize,
    /// Number of live interior nodes right now.
    pub n_nodes: usize,
    /// High-water mark of `n_nodes` ever observed.
    pub peak_nodes: usize,
    /// High-water mark of nodes reachable from at least one live handle.
    pub peak_live_nodes: usize,
    /// Cumulative wall-clock time spent inside the reordering engine.
    pub reordering_time_sec: f64,
    /// Number of completed sifting passes.
    pub n_reorderings: usize,
    /// Rough estimate of current memory use, in bytes.
    pub mem_bytes: u64,
    /// Total capacity (in slots) of the unique table across all levels.
    pub unique_size: usize,
    /// `unique table occupied slots / unique_size`, in `[0.0, 1.0]`.
    pub unique_used_fraction: f64,
    /// Total capacity (in slots) of the ComputedTable.
    pub cache_size: usize,
    /// `cache occupied slots / cache_size`, in `[0.0, 1.0]`.
    pub cache_used_fraction: f64,
    /// Total ComputedTable lookups ever performed.
    pub cache_lookups: u64,
    /// Total ComputedTable lookups that hit.
    pub cache_hits: u64,
    /// Total ComputedTable insertions ever performed.
    pub cache_insertions: u64,
    /// Number of insertions that overwrote a distinct, still-valid entry
    /// (the table is direct-mapped and lossy, so this is expected, not
    /// an error condition).
    pub cache_collisions: u64,
    /// Number of entries invalidated by a GC sweep.
    pub cache_deletions: u64,
}

impl Stats {
    /// Hit rate as a percentage in `[0.0, 100.0]`. `100.0` when there
    /// have been no lookups yet (an empty cache has nothing to miss).
    pub fn cache_hit_rate(&self) -> f64 {
        if self.cache_lookups == 0 {
            100.0
        } else {
            100.0 * (self.cache_hits as f64) / (self.cache_lookups as f64)
        }
    }
}
