//! # treebeam-core
//!
//! Incremental, bounded-memory tree search over a caller-supplied state type.
//!
//! The engine grows a depth-bounded search tree across repeated decision ticks,
//! keeping nodes in pooled arenas, scheduling not-yet-expanded candidates through
//! per-depth score-ordered frontiers, deduplicating transpositions per depth, and
//! pruning under a soft node budget. Between ticks the window of frontiers slides
//! forward by one ply so work done beyond the committed move is reused.
//!
//! ## Module layout
//!
//! - `state`: capability contract the pluggable problem type must satisfy
//! - `arena`: pooled node allocation with O(1) free-list reuse, one arena per lane
//! - `frontier`: per-depth candidate ordering and transposition deduplication
//! - `window`: the sliding array of per-depth frontiers
//! - `search`: the two controllers (single-cursor sequential, multi-lane parallel)
//!   plus the lane scheduler and runtime configuration
//! - `error`: fatal configuration failures

pub mod arena;
pub mod error;
pub mod frontier;
pub mod search;
pub mod state;
pub mod window;

pub use arena::NodeId;
pub use error::{SearchError, SearchResult};
pub use search::{
    DepthTasks, LaneBatch, ParallelSearcher, ParentTask, SearchConfig, Searcher,
};
pub use state::SearchState;
