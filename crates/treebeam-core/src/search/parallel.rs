//! Multi-lane parallel controller.
//!
//! The controller is not internally synchronized. A round works like this:
//! [`take_batches`](ParallelSearcher::take_batches) hands out disjoint per-lane
//! batches, each carrying its lane's arena by value and clones of the parent
//! states, so concurrently running lanes never share allocation state and never
//! read foreign arenas. The caller executes every batch (on whatever worker
//! facility it likes), then funnels them back through a single thread with
//! [`commit`](ParallelSearcher::commit), which links children into the tree and
//! pushes them through the shared frontiers and transposition tables.
//! [`finalize`](ParallelSearcher::finalize) then lets the best terminal leaves
//! vote and beam-prunes the shallowest branching depth. Committing to a move is
//! [`try_advance`](ParallelSearcher::try_advance). There is no cancellation;
//! timeouts live entirely in the caller's loop.

use log::{debug, trace};

use crate::arena::{LaneSet, NodeArena, NodeId, NodeRead, NodeStore};
use crate::error::{SearchError, SearchResult};
use crate::search::{first_parent, lanes, SearchConfig};
use crate::state::SearchState;
use crate::window::SearchWindow;

/// One issued parent: its id plus a clone of its state to expand from.
pub struct ParentTask<S> {
    pub id: NodeId,
    pub state: S,
}

/// The parents issued to one lane at one depth. Children belong to
/// `depth + 1`.
pub struct DepthTasks<S> {
    pub depth: usize,
    pub parents: Vec<ParentTask<S>>,
}

struct Produced {
    id: NodeId,
    depth: usize,
    score: f64,
}

/// A lane's work for one round, owning the lane's arena until committed.
///
/// `LaneBatch` is `Send` (for `S: Send`): batches are meant to be fanned out
/// across threads and funneled back to the controller thread for
/// [`ParallelSearcher::commit`].
pub struct LaneBatch<S> {
    lane: u32,
    arena: NodeArena<S>,
    tasks: Vec<DepthTasks<S>>,
    produced: Vec<Produced>,
}

impl<S: SearchState> LaneBatch<S> {
    pub fn lane(&self) -> u32 {
        self.lane
    }

    /// Takes the issued tasks out of the batch, leaving it ready to receive
    /// children while the caller iterates the task list.
    pub fn take_tasks(&mut self) -> Vec<DepthTasks<S>> {
        std::mem::take(&mut self.tasks)
    }

    /// Allocates a child of `parent` in this lane's arena and records it with
    /// its score for the commit pass. `depth` is the child's depth, i.e. the
    /// issued `DepthTasks::depth + 1`.
    pub fn push_child(&mut self, depth: usize, parent: NodeId, state: S, score: f64) {
        let id = self.arena.allocate(Some(parent), state);
        self.produced.push(Produced { id, depth, score });
    }
}

/// Parallel search controller with vote-weighted beam pruning.
pub struct ParallelSearcher<S: SearchState> {
    config: SearchConfig,
    lanes: LaneSet<S>,
    window: SearchWindow,
    root: Option<NodeId>,
    outstanding: usize,
    total_nodes: u64,
}

impl<S: SearchState> ParallelSearcher<S> {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            lanes: LaneSet::new(1),
            window: SearchWindow::empty(),
            root: None,
            outstanding: 0,
            total_nodes: 0,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SearchConfig {
        &mut self.config
    }

    pub fn live_nodes(&self) -> usize {
        self.lanes.live_len()
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.lane_count()
    }

    /// Duplicate states rejected by the transposition tables so far.
    pub fn collisions(&self) -> u64 {
        self.window.collisions()
    }

    /// Nodes generated since the last reset, duplicates included.
    pub fn total_nodes(&self) -> u64 {
        self.total_nodes
    }

    /// Discards the tree and roots a fresh window at the observed state.
    /// Lane storage is retained when the lane count is unchanged.
    pub fn reset(&mut self, observed: &S, lane_count: usize) {
        debug_assert_eq!(self.outstanding, 0, "reset with outstanding lane batches");
        debug!(
            "resetting depth-{} window across {} lanes",
            self.config.depth,
            lane_count.max(1)
        );
        self.lanes.reset(lane_count);
        self.window = SearchWindow::new(self.config.depth, self.config.dedup);
        let root = self.lanes.allocate_in(0, None, observed.clone());
        let accepted = self.window.depth_mut(0).push(root, 0.0, &self.lanes);
        debug_assert!(accepted);
        self.root = Some(root);
        self.outstanding = 0;
        self.total_nodes = 1;
    }

    /// Issues one round of per-lane batches.
    ///
    /// An empty set means this round has nothing to do (the caller should
    /// [`finalize`](ParallelSearcher::finalize) or stop). At the node limit a
    /// beam-prune pass is attempted first; if it cannot free room the
    /// configuration cannot sustain the horizon.
    pub fn take_batches(&mut self) -> SearchResult<Vec<LaneBatch<S>>> {
        debug_assert_eq!(self.outstanding, 0, "previous round not committed");
        if self.window.depth_count() == 0 {
            return Ok(Vec::new());
        }
        if self.lanes.live_len() >= self.config.node_limit {
            let pruned = self.prune_beam();
            if self.lanes.live_len() >= self.config.node_limit {
                if pruned {
                    // progress was made; let the outer loop finalize and retry
                    return Ok(Vec::new());
                }
                return Err(SearchError::NodeLimitTooLow {
                    node_limit: self.config.node_limit,
                    depth: self.config.depth,
                });
            }
        }
        let free_counts = self.lanes.free_counts();
        let plans = lanes::partition(
            &mut self.window,
            &self.lanes,
            &free_counts,
            self.config.depth_task_size,
        );
        let batches: Vec<LaneBatch<S>> = plans
            .into_iter()
            .map(|plan| LaneBatch {
                lane: plan.lane,
                arena: self.lanes.checkout(plan.lane),
                tasks: plan.tasks,
                produced: Vec::new(),
            })
            .collect();
        self.outstanding = batches.len();
        Ok(batches)
    }

    /// Funnels a round's batches back in: restores the lane arenas, links each
    /// produced child into its parent's chain and enqueues it, discarding
    /// same-depth duplicates. Must be called from one thread, with every batch
    /// of the round, before `finalize` or `try_advance`.
    pub fn commit(&mut self, batches: Vec<LaneBatch<S>>) {
        let mut produced = Vec::new();
        for batch in batches {
            self.lanes.restore(batch.arena);
            self.outstanding = self.outstanding.saturating_sub(1);
            produced.extend(batch.produced);
        }
        self.total_nodes += produced.len() as u64;
        for child in produced {
            debug_assert!(child.depth < self.window.depth_count());
            if self
                .window
                .depth_mut(child.depth)
                .push(child.id, child.score, &self.lanes)
            {
                let parent = self
                    .lanes
                    .node(child.id)
                    .parent
                    .expect("batch children always have a parent");
                let head = self.lanes.node(parent).child;
                self.lanes.node_mut(child.id).sibling = head;
                self.lanes.node_mut(parent).child = Some(child.id);
            } else {
                trace!("duplicate state discarded at depth {}", child.depth);
                self.lanes.deallocate(child.id);
            }
        }
    }

    /// Lets the `award_width` best terminal leaves vote, then beam-prunes.
    ///
    /// Each selected leaf adds a rank-weighted credit (best leaf contributes
    /// most) to every node on its ancestor chain below the root; the
    /// shallowest branching depth is then cut down to the top `prune_width`
    /// siblings by accumulated reward.
    pub fn finalize(&mut self) {
        debug_assert_eq!(self.outstanding, 0, "finalize with outstanding lane batches");
        if self.window.depth_count() == 0 {
            return;
        }
        let terminal = self.window.depth_count() - 1;
        let top = self.window.depth_mut(terminal).top_k(self.config.award_width);
        if top.is_empty() {
            return;
        }
        let mut credit = top.len() as u32;
        for &(leaf, _) in &top {
            self.award(leaf, credit);
            credit -= 1;
        }
        self.prune_beam();
    }

    /// Commits to the root's highest-reward direct child: siblings and their
    /// subtrees are discarded, the window slides one ply and orphans are
    /// swept. Returns `false` when there is no tree or no child to advance
    /// into, in which case the caller rebuilds via
    /// [`reset`](ParallelSearcher::reset).
    pub fn try_advance(&mut self) -> bool {
        debug_assert_eq!(self.outstanding, 0, "try_advance with outstanding lane batches");
        let Some(root) = self.root else {
            return false;
        };
        let Some(first) = self.lanes.node(root).child else {
            return false;
        };
        let mut children = vec![first];
        let mut cursor = self.lanes.node(first).sibling;
        while let Some(id) = cursor {
            children.push(id);
            cursor = self.lanes.node(id).sibling;
        }
        let mut best = children[0];
        for &child in &children[1..] {
            if self.lanes.node(child).reward > self.lanes.node(best).reward {
                best = child;
            }
        }
        for &child in &children {
            if child != best {
                self.lanes.deallocate_subtree(child);
            }
        }
        // detach the survivor before freeing the old root
        self.lanes.node_mut(root).child = None;
        self.lanes.deallocate(root);
        self.lanes.node_mut(best).parent = None;
        self.lanes.node_mut(best).sibling = None;
        self.root = Some(best);

        self.window.slide();
        for depth in 0..self.window.depth_count() {
            self.window.depth_mut(depth).cleanup(&mut self.lanes);
        }
        trace!("advanced root, {} nodes live", self.lanes.live_len());
        true
    }

    /// State of the best leaf's ancestor directly below the root: the concrete
    /// next move. Uses the deepest depth with content, so a tick cut short
    /// still yields the best partial result.
    pub fn best_state(&self) -> Option<&S> {
        let (_, leaf) = self.window.best_leaf()?;
        let anchor = first_parent(&self.lanes, leaf)?;
        Some(&self.lanes.node(anchor).state)
    }

    /// True when no depth below the terminal one has unexpanded work and the
    /// node limit leaves no pruning pending.
    pub fn is_search_complete(&self) -> bool {
        if self.window.depth_count() == 0 {
            return true;
        }
        if self.lanes.live_len() >= self.config.node_limit {
            return false;
        }
        let terminal = self.window.depth_count() - 1;
        (0..terminal).all(|depth| self.window.depth(depth).unsearched_is_empty())
    }

    /// True once a result can be extracted: the terminal frontier has content,
    /// or the search ran to completion at a shallower depth.
    pub fn is_releasable(&self) -> bool {
        if self.window.depth_count() == 0 {
            return false;
        }
        let terminal = self.window.depth_count() - 1;
        if self.window.depth(terminal).unsearched_is_empty() {
            self.is_search_complete()
        } else {
            true
        }
    }

    /// Adds `credit` to every node on the leaf's ancestor chain below the
    /// root. Iterative on purpose; the chain is at most `depth` long.
    fn award(&mut self, leaf: NodeId, credit: u32) {
        let mut cursor = leaf;
        while let Some(parent) = self.lanes.node(cursor).parent {
            self.lanes.node_mut(cursor).reward += credit;
            cursor = parent;
        }
    }

    /// Walks down from the root while the branch is forced, then keeps only
    /// the top `prune_width` siblings (at least one) of the first branching
    /// depth, by accumulated reward. Returns whether anything was discarded.
    fn prune_beam(&mut self) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        let mut cursor = root;
        loop {
            match self.lanes.node(cursor).child {
                Some(child) if self.lanes.node(child).sibling.is_none() => cursor = child,
                _ => break,
            }
        }
        let Some(first) = self.lanes.node(cursor).child else {
            return false;
        };
        let mut siblings = vec![first];
        let mut next = self.lanes.node(first).sibling;
        while let Some(id) = next {
            siblings.push(id);
            next = self.lanes.node(id).sibling;
        }
        let keep = self.config.prune_width.clamp(1, siblings.len());
        if siblings.len() <= keep {
            return false;
        }
        siblings.sort_by(|&a, &b| self.lanes.node(b).reward.cmp(&self.lanes.node(a).reward));
        for &loser in &siblings[keep..] {
            self.lanes.deallocate_subtree(loser);
        }
        // relink the survivors, best reward at the head
        self.lanes.node_mut(cursor).child = None;
        for &survivor in siblings[..keep].iter().rev() {
            let head = self.lanes.node(cursor).child;
            self.lanes.node_mut(survivor).sibling = head;
            self.lanes.node_mut(cursor).child = Some(survivor);
        }
        for depth in 0..self.window.depth_count() {
            self.window.depth_mut(depth).cleanup(&mut self.lanes);
        }
        debug!(
            "beam prune kept {keep} of {} branches, {} nodes live",
            siblings.len(),
            self.lanes.live_len()
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk on the number line; one tick moves the position by -1/0/+1.
    #[derive(Clone, PartialEq, Debug)]
    struct Pos(i32);

    impl SearchState for Pos {
        fn state_key(&self) -> u64 {
            self.0 as u64
        }
    }

    fn searcher(depth: usize) -> ParallelSearcher<Pos> {
        ParallelSearcher::new(SearchConfig {
            depth,
            award_width: 1,
            prune_width: 1,
            ..SearchConfig::default()
        })
    }

    /// Runs one full round: expand every issued parent with `expand`, commit.
    fn round(
        s: &mut ParallelSearcher<Pos>,
        expand: impl Fn(&Pos) -> Vec<(i32, f64)>,
    ) -> usize {
        let mut batches = s.take_batches().unwrap();
        let mut expanded = 0;
        for batch in &mut batches {
            for tasks in batch.take_tasks() {
                for parent in tasks.parents {
                    expanded += 1;
                    for (pos, score) in expand(&parent.state) {
                        batch.push_child(tasks.depth + 1, parent.id, Pos(pos), score);
                    }
                }
            }
        }
        s.commit(batches);
        expanded
    }

    fn reward_of(s: &ParallelSearcher<Pos>, value: i32) -> Option<u32> {
        s.lanes
            .iter_live()
            .find(|(_, node)| node.state == Pos(value))
            .map(|(_, node)| node.reward)
    }

    #[test]
    fn test_award_reaches_ancestors_and_no_one_else() {
        let mut s = searcher(2);
        s.reset(&Pos(0), 1);

        // depth 0 -> 1: two branches
        assert_eq!(round(&mut s, |p| vec![(p.0 + 1, 1.0), (p.0 - 1, 0.5)]), 1);
        // depth 1 -> 2: one strong leaf under +1, one weak under -1
        assert_eq!(
            round(&mut s, |p| vec![(p.0 * 2, if p.0 > 0 { 9.0 } else { 1.0 })]),
            2
        );

        s.finalize();
        // the single voting leaf is Pos(2); its chain below the root is
        // Pos(2) -> Pos(1)
        assert_eq!(reward_of(&s, 2), Some(1));
        assert_eq!(reward_of(&s, 1), Some(1));
        // the root never accumulates reward, losers were beam-pruned away
        assert_eq!(reward_of(&s, 0), Some(0));
        assert_eq!(reward_of(&s, -1), None);
        assert_eq!(reward_of(&s, -2), None);
        assert_eq!(s.live_nodes(), 3);
        assert_eq!(s.best_state(), Some(&Pos(1)));
    }

    #[test]
    fn test_try_advance_commits_best_reward_child() {
        let mut s = searcher(2);
        s.reset(&Pos(0), 1);
        round(&mut s, |p| vec![(p.0 + 1, 1.0), (p.0 - 1, 0.5)]);
        round(&mut s, |p| vec![(p.0 * 2, if p.0 > 0 { 9.0 } else { 1.0 })]);
        s.finalize();

        assert!(s.try_advance());
        assert_eq!(s.live_nodes(), 2); // new root (+1) and its retained leaf
        assert_eq!(s.best_state(), Some(&Pos(2)));

        // the retained leaf shifted from depth 2 to depth 1 and is issuable
        let expanded = round(&mut s, |p| vec![(p.0 + 1, 3.0)]);
        assert_eq!(expanded, 1);
    }

    #[test]
    fn test_try_advance_without_tree_or_children() {
        let mut s = searcher(2);
        assert!(!s.try_advance());
        s.reset(&Pos(0), 1);
        assert!(!s.try_advance());
    }

    #[test]
    fn test_commit_discards_same_depth_duplicates() {
        let mut s = searcher(2);
        s.reset(&Pos(0), 2);
        round(&mut s, |p| vec![(p.0 + 1, 1.0), (p.0 + 1, 2.0), (p.0 + 2, 0.5)]);
        assert_eq!(s.collisions(), 1);
        assert_eq!(s.live_nodes(), 3); // root + two distinct children
        assert_eq!(s.total_nodes(), 4); // the duplicate still counts as generated
    }

    #[test]
    fn test_node_limit_error_when_nothing_prunable() {
        let mut s = searcher(3);
        s.config_mut().node_limit = 1;
        s.reset(&Pos(0), 1);
        assert!(matches!(
            s.take_batches(),
            Err(SearchError::NodeLimitTooLow { .. })
        ));
    }

    #[test]
    fn test_completion_and_release() {
        let mut s = searcher(1);
        s.reset(&Pos(0), 1);
        assert!(!s.is_search_complete());
        assert!(!s.is_releasable());

        round(&mut s, |p| vec![(p.0 + 1, 1.0)]);
        // all non-terminal depths drained; terminal holds the result
        assert!(s.is_search_complete());
        assert!(s.is_releasable());
        assert_eq!(s.best_state(), Some(&Pos(1)));
    }

    #[test]
    fn test_beam_prune_keeps_top_width_branches() {
        let mut s = searcher(2);
        s.config_mut().prune_width = 2;
        s.config_mut().award_width = 3;
        s.reset(&Pos(0), 1);
        round(&mut s, |p| {
            vec![(p.0 + 1, 1.0), (p.0 + 2, 2.0), (p.0 + 3, 3.0), (p.0 + 4, 4.0)]
        });
        round(&mut s, |p| vec![(p.0 + 10, p.0 as f64)]);
        s.finalize();

        // leaves under +4, +3, +2 voted (3, 2, 1 credits); branches +2..+4
        // outrank +1, and only the best two survive
        assert_eq!(reward_of(&s, 4), Some(3));
        assert_eq!(reward_of(&s, 3), Some(2));
        assert_eq!(reward_of(&s, 2), None);
        assert_eq!(reward_of(&s, 1), None);
    }
}
