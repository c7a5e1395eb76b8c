//! Single-cursor sequential controller.
//!
//! Every operation runs synchronously under exclusive caller control; the
//! caller's own loop decides when to stop requesting tasks. Memory pressure is
//! relieved by ancestor-collapse pruning: the shallowest depth holding more
//! than one live node is collapsed down to the ancestor of the current best
//! leaf, discarding branches provably inferior to it, nearest the root first.

use log::{debug, trace};

use crate::arena::{NodeArena, NodeId, NodeRead, NodeStore};
use crate::error::{SearchError, SearchResult};
use crate::search::{ancestor_at, first_parent, SearchConfig};
use crate::state::SearchState;
use crate::window::SearchWindow;

#[derive(Default)]
struct Cursor {
    depth: usize,
    issued: Option<NodeId>,
    child: Option<NodeId>,
}

/// Sequential search controller.
///
/// Per tick: [`prepare`](Searcher::prepare), then a caller-driven loop of
/// [`next_task`](Searcher::next_task) / [`derive_child`](Searcher::derive_child)
/// / [`report`](Searcher::report), then [`best_move`](Searcher::best_move).
pub struct Searcher<S: SearchState> {
    config: SearchConfig,
    arena: NodeArena<S>,
    window: SearchWindow,
    cursor: Cursor,
    total_nodes: u64,
}

impl<S: SearchState> Searcher<S> {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            arena: NodeArena::new(0),
            window: SearchWindow::empty(),
            cursor: Cursor::default(),
            total_nodes: 0,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// All fields are runtime-mutable; a changed `depth` takes effect at the
    /// next [`prepare`](Searcher::prepare), which rebuilds the window.
    pub fn config_mut(&mut self) -> &mut SearchConfig {
        &mut self.config
    }

    pub fn live_nodes(&self) -> usize {
        self.arena.len()
    }

    /// Duplicate states rejected by the transposition table so far.
    pub fn collisions(&self) -> u64 {
        self.window.collisions()
    }

    /// Nodes generated since the last rebuild, duplicates included.
    pub fn total_nodes(&self) -> u64 {
        self.total_nodes
    }

    /// Tick reconciliation: reset or advance.
    ///
    /// The retained tree is a cache, never the source of truth. If the world
    /// still sits at the retained root's state the window is kept untouched.
    /// If the world moved to the branch this engine recommended (the best
    /// leaf's ancestor directly below the root), the window slides forward one
    /// ply, the new depth 0 collapses to that ancestor and orphans are swept.
    /// Any other observed state silently triggers a full rebuild.
    pub fn prepare(&mut self, observed: &S) {
        self.cursor = Cursor::default();
        if self.window.depth_count() != self.config.depth + 1 {
            self.rebuild(observed);
            return;
        }
        let Some(root) = self.window.depth(0).sole_node() else {
            self.rebuild(observed);
            return;
        };
        if self.arena.node(root).state == *observed {
            return;
        }
        let anchor = self
            .window
            .best_leaf()
            .and_then(|(_, leaf)| first_parent(&self.arena, leaf));
        let anchor = match anchor {
            Some(anchor) if self.arena.node(anchor).state == *observed => anchor,
            _ => {
                debug!("observed state diverged from retained tree, rebuilding");
                self.rebuild(observed);
                return;
            }
        };
        self.arena.deallocate(root);
        self.window.slide();
        self.window.depth_mut(0).filter(anchor, &mut self.arena);
        self.arena.node_mut(anchor).parent = None;
        for depth in 1..self.window.depth_count() {
            self.window.depth_mut(depth).cleanup(&mut self.arena);
        }
        trace!("window advanced, {} live nodes retained", self.arena.len());
    }

    /// Issues the next unexpanded node, best-score-first at the first depth
    /// with pending work, round-robining a depth cursor from its last
    /// position. The terminal depth is never issued; its nodes only rank
    /// results.
    ///
    /// `Ok(None)` means the tick is exhausted. `Err` means the node limit was
    /// reached and pruning could not create room, a configuration error.
    pub fn next_task(&mut self) -> SearchResult<Option<&S>> {
        self.cursor.issued = None;
        self.cursor.child = None;
        if self.window.depth_count() == 0 {
            return Ok(None);
        }
        if self.arena.len() >= self.config.node_limit {
            self.prune()?;
        }
        let issue_depths = self.window.depth_count() - 1;
        let mut checked = 0;
        while checked < issue_depths
            && self.window.depth(self.cursor.depth).unsearched_is_empty()
        {
            checked += 1;
            self.cursor.depth += 1;
            if self.cursor.depth >= issue_depths {
                self.cursor.depth = 0;
            }
        }
        if checked >= issue_depths {
            return Ok(None);
        }
        match self.window.depth_mut(self.cursor.depth).pop_best() {
            Some((id, _)) => {
                self.cursor.issued = Some(id);
                Ok(Some(&self.arena.node(id).state))
            }
            None => Ok(None),
        }
    }

    /// Allocates a child of the issued node, pre-populated with a clone of the
    /// parent's state. The caller applies exactly one candidate decision to
    /// the returned state, then calls [`report`](Searcher::report).
    ///
    /// # Panics
    /// If no task was issued by the preceding [`next_task`](Searcher::next_task).
    pub fn derive_child(&mut self) -> &mut S {
        let parent = self
            .cursor
            .issued
            .expect("next_task must issue a task before derive_child");
        let state = self.arena.node(parent).state.clone();
        let child = self.arena.allocate(Some(parent), state);
        self.cursor.child = Some(child);
        self.total_nodes += 1;
        &mut self.arena.node_mut(child).state
    }

    /// Enqueues the derived child into the issued depth's successor frontier.
    /// A same-depth duplicate is discarded and its node recycled.
    ///
    /// # Panics
    /// If no child is pending from [`derive_child`](Searcher::derive_child).
    pub fn report(&mut self, score: f64) {
        let child = self
            .cursor
            .child
            .take()
            .expect("derive_child must allocate before report");
        let depth = self.cursor.depth + 1;
        debug_assert!(depth < self.window.depth_count());
        if !self.window.depth_mut(depth).push(child, score, &self.arena) {
            trace!("duplicate state discarded at depth {depth}");
            self.arena.deallocate(child);
        }
    }

    /// State of the best-known leaf's ancestor directly below the root: the
    /// concrete next move. `None` while the tree has not progressed past the
    /// root. Uses the deepest depth with content, so early termination still
    /// yields the best partial result.
    pub fn best_move(&self) -> Option<&S> {
        let (_, leaf) = self.window.best_leaf()?;
        let anchor = first_parent(&self.arena, leaf)?;
        Some(&self.arena.node(anchor).state)
    }

    fn rebuild(&mut self, observed: &S) {
        debug!("rebuilding depth-{} window from observed state", self.config.depth);
        self.arena.reset();
        self.window = SearchWindow::new(self.config.depth, self.config.dedup);
        let root = self.arena.allocate(None, observed.clone());
        let accepted = self.window.depth_mut(0).push(root, 0.0, &self.arena);
        debug_assert!(accepted);
        self.total_nodes = 1;
    }

    /// Ancestor-collapse prune: the shallowest depth with more than one live
    /// node is filtered down to the current best leaf's ancestor at that
    /// depth, then orphans cascade out of every depth up to the deepest
    /// active one. Fails when first and last active depth coincide: collapsing
    /// would free nothing, so the node limit cannot sustain this horizon.
    fn prune(&mut self) -> SearchResult<()> {
        let too_low = SearchError::NodeLimitTooLow {
            node_limit: self.config.node_limit,
            depth: self.config.depth,
        };
        let first = self.window.first_active(self.config.prune_depth_limit);
        let last = self.window.last_active();
        let (first, last) = match (first, last) {
            (Some(first), Some(last)) if first < last => (first, last),
            _ => return Err(too_low),
        };
        let Some((leaf, _)) = self.window.depth(last).peek_best() else {
            return Err(too_low);
        };
        let survivor = ancestor_at(&self.arena, leaf, last - first);
        self.window.depth_mut(first).filter(survivor, &mut self.arena);
        for depth in first..=last {
            self.window.depth_mut(depth).cleanup(&mut self.arena);
        }
        debug!(
            "pruned depth {first} to the best-leaf ancestor, {} nodes live",
            self.arena.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk on the number line; one tick moves the position by any of -1/0/+1.
    #[derive(Clone, PartialEq, Debug)]
    struct Pos(i32);

    impl SearchState for Pos {
        fn state_key(&self) -> u64 {
            self.0 as u64
        }
    }

    fn searcher(depth: usize, node_limit: usize) -> Searcher<Pos> {
        Searcher::new(SearchConfig {
            depth,
            node_limit,
            ..SearchConfig::default()
        })
    }

    /// Issues a task, asserts its state, and reports the given children.
    fn expand(s: &mut Searcher<Pos>, expect: i32, children: &[(i32, f64)]) {
        let task = s.next_task().unwrap().expect("a task should be pending");
        assert_eq!(*task, Pos(expect));
        for &(pos, score) in children {
            *s.derive_child() = Pos(pos);
            s.report(score);
        }
    }

    #[test]
    fn test_best_move_picks_highest_scored_child() {
        let mut s = searcher(2, 100);
        s.prepare(&Pos(0));
        expand(&mut s, 0, &[(-1, 5.0), (1, 9.0)]);
        assert_eq!(s.best_move(), Some(&Pos(1)));
    }

    #[test]
    fn test_result_follows_deepest_leaf_ancestry() {
        let mut s = searcher(2, 100);
        s.prepare(&Pos(0));
        expand(&mut s, 0, &[(-1, 5.0), (1, 4.0)]);
        // best at depth 1 is -1, but the deepest leaf grows under +1
        expand(&mut s, -1, &[]);
        expand(&mut s, 1, &[(2, 9.0)]);
        assert_eq!(s.best_move(), Some(&Pos(1)));
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let mut s = searcher(1, 100);
        s.prepare(&Pos(0));
        expand(&mut s, 0, &[(1, 1.0)]);
        // depth 1 is terminal: never issued, so the tick is complete
        assert_eq!(s.next_task().unwrap(), None);
        assert_eq!(s.best_move(), Some(&Pos(1)));
    }

    #[test]
    fn test_duplicate_children_collapse_to_one() {
        let mut s = searcher(2, 100);
        s.prepare(&Pos(0));
        expand(&mut s, 0, &[(1, 1.0), (1, 2.0), (2, 3.0)]);
        assert_eq!(s.collisions(), 1);
        assert_eq!(s.live_nodes(), 3); // root + two distinct children
        assert_eq!(s.total_nodes(), 4); // the duplicate still counts as generated
    }

    #[test]
    fn test_prune_collapses_to_best_leaf_ancestor() {
        let mut s = searcher(3, 1000);
        s.prepare(&Pos(0));
        expand(&mut s, 0, &[(-1, 1.0), (1, 5.0), (2, 3.0)]);
        expand(&mut s, 1, &[(2, 9.0), (0, 2.0)]);
        assert_eq!(s.live_nodes(), 6);

        // Lower the cap: the next issuance must prune before allocating.
        s.config_mut().node_limit = 2;
        let task = s.next_task().unwrap().expect("prune must create room");
        assert_eq!(*task, Pos(2));
        // depth 1 collapsed to the best leaf's ancestor (+1), orphans swept
        assert_eq!(s.live_nodes(), 4); // root, +1, and its two children

        // The next check prunes depth 2 down to the issued node's branch and
        // finds nothing else to expand below the terminal depth.
        *s.derive_child() = Pos(3);
        s.report(9.5);
        assert_eq!(s.next_task().unwrap(), None);

        // With every depth down to a single node, pruning cannot free room.
        assert!(matches!(
            s.next_task(),
            Err(SearchError::NodeLimitTooLow { .. })
        ));
    }

    #[test]
    fn test_node_limit_too_low_on_single_active_depth() {
        let mut s = searcher(3, 3);
        s.prepare(&Pos(0));
        expand(&mut s, 0, &[(-1, 1.0), (1, 2.0), (2, 3.0)]);
        assert!(matches!(
            s.next_task(),
            Err(SearchError::NodeLimitTooLow { .. })
        ));
    }

    #[test]
    fn test_prepare_keeps_window_when_world_unchanged() {
        let mut s = searcher(2, 100);
        s.prepare(&Pos(0));
        expand(&mut s, 0, &[(1, 9.0)]);
        let live = s.live_nodes();
        s.prepare(&Pos(0));
        assert_eq!(s.live_nodes(), live);
        assert_eq!(s.best_move(), Some(&Pos(1)));
    }

    #[test]
    fn test_prepare_advances_along_committed_move() {
        let mut s = searcher(2, 100);
        s.prepare(&Pos(0));
        expand(&mut s, 0, &[(1, 6.0), (-1, 1.0)]);
        expand(&mut s, 1, &[(2, 9.0)]);
        assert_eq!(s.best_move(), Some(&Pos(1)));

        // Commit the recommended move; deeper work is preserved.
        s.prepare(&Pos(1));
        assert_eq!(s.live_nodes(), 2); // new root (+1) and its leaf (+2)
        assert_eq!(s.best_move(), Some(&Pos(2)));

        // The retained leaf is re-issued from the shifted depth.
        let task = s.next_task().unwrap().expect("retained work");
        assert_eq!(*task, Pos(2));
    }

    #[test]
    fn test_prepare_rebuilds_on_divergence() {
        let mut s = searcher(2, 100);
        s.prepare(&Pos(0));
        expand(&mut s, 0, &[(1, 6.0), (-1, 1.0)]);
        s.prepare(&Pos(42));
        assert_eq!(s.live_nodes(), 1);
        assert_eq!(s.best_move(), None);
        expand(&mut s, 42, &[(43, 1.0)]);
        assert_eq!(s.best_move(), Some(&Pos(43)));
    }
}
