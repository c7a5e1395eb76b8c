//! Runtime search configuration.

/// Plain runtime-mutable knobs shared by both controllers. Fields not relevant
/// to a mode are ignored by it.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Search horizon in plies; the window holds `depth + 1` frontiers.
    pub depth: usize,

    /// Soft cap on live nodes. Issuance attempts a prune pass at or above the
    /// cap; one over-limit batch may still land before the next check.
    pub node_limit: usize,

    /// Sibling branches kept alive by a beam prune pass (parallel mode).
    pub prune_width: usize,

    /// Shallowest depth the ancestor-collapse prune may act on (sequential
    /// mode). 0 lets pruning collapse right below the root.
    pub prune_depth_limit: usize,

    /// How many best terminal leaves vote during finalize (parallel mode).
    pub award_width: usize,

    /// Batch granularity: nodes drained per depth per lane and the assignment
    /// threshold after which issuance moves to another lane (parallel mode).
    pub depth_task_size: usize,

    /// Same-depth duplicate suppression through the transposition table.
    pub dedup: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            depth: 7,
            node_limit: 100_000,
            prune_width: 1,
            prune_depth_limit: 0,
            award_width: 25,
            depth_task_size: 16,
            dedup: true,
        }
    }
}
