//! Error types for the search engine.

/// Fatal engine failures.
///
/// Exhaustion of frontier work is not an error (task issuance returns `None` /
/// an empty batch set); duplicate-state discards are silent. The only fatal
/// condition is a configuration that pruning cannot rescue.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The live node count reached `node_limit` and the prune pass could not
    /// free any room: every live node sits on a single active depth, so
    /// collapsing ancestors would not reclaim anything. The configured
    /// `node_limit` is too small for the configured `depth`.
    #[error("node_limit {node_limit} cannot sustain a depth-{depth} window: pruning found no collapsible depth")]
    NodeLimitTooLow { node_limit: usize, depth: usize },
}

/// Result type for engine operations.
pub type SearchResult<T> = Result<T, SearchError>;
