//! Search controllers.
//!
//! Two operating modes over the same arena/frontier substrate:
//!
//! - [`Searcher`]: single-cursor sequential issuance, ancestor-collapse pruning
//! - [`ParallelSearcher`]: multi-lane batch issuance, vote-weighted beam pruning

pub mod config;
pub mod lanes;
pub mod parallel;
pub mod sequential;

pub use config::SearchConfig;
pub use parallel::{DepthTasks, LaneBatch, ParallelSearcher, ParentTask};
pub use sequential::Searcher;

use crate::arena::{NodeId, NodeRead};

/// Ancestor of `id` sitting directly below the root, i.e. the node representing
/// the concrete next move from the current root. `None` when `id` is the root
/// itself (the tree has not progressed past it).
pub(crate) fn first_parent<S>(store: &impl NodeRead<S>, id: NodeId) -> Option<NodeId> {
    let mut cursor = id;
    loop {
        let parent = store.node(cursor).parent?;
        if store.node(parent).parent.is_none() {
            return Some(cursor);
        }
        cursor = parent;
    }
}

/// Ancestor of `id` exactly `steps` levels up. Walking past the root violates
/// the window-depth invariant and panics.
pub(crate) fn ancestor_at<S>(store: &impl NodeRead<S>, mut id: NodeId, steps: usize) -> NodeId {
    for _ in 0..steps {
        id = store
            .node(id)
            .parent
            .expect("ancestor walk escaped the window root");
    }
    id
}
