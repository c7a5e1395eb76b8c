//! Pooled node storage.
//!
//! Nodes live in per-lane, index-addressed slabs. Slots are append-only, so a
//! `NodeId` stays valid until the node is deallocated or the arena is reset;
//! parent/child/sibling links are ids, never references. Liveness is an
//! explicit out-of-band tag so a pruned node's former payload stays inspectable.

use std::fmt;

/// Address of a node: which lane owns it and its slot index inside that lane.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub lane: u32,
    pub index: u32,
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}:{}", self.lane, self.index)
    }
}

/// Liveness tag. A `Dead` node sits on its lane's free list; any id pointing at
/// it is stale and must be dropped by the next cleanup pass.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Liveness {
    Live,
    Dead,
}

/// One tree vertex.
///
/// `parent` is a non-owning back-reference used only for ancestor walks; the
/// arena owns every node. `child`/`sibling` form the first-child/next-sibling
/// chain maintained by the parallel controller (the sequential controller
/// leaves them `None`). `reward` accumulates vote credit during beam pruning.
pub struct Node<S> {
    pub parent: Option<NodeId>,
    pub child: Option<NodeId>,
    pub sibling: Option<NodeId>,
    pub reward: u32,
    liveness: Liveness,
    free_next: Option<u32>,
    pub state: S,
}

impl<S> Node<S> {
    pub fn is_live(&self) -> bool {
        self.liveness == Liveness::Live
    }
}

/// Read access to nodes, implemented by a single arena and by a lane set.
pub trait NodeRead<S> {
    fn node(&self, id: NodeId) -> &Node<S>;

    fn is_live(&self, id: NodeId) -> bool {
        self.node(id).is_live()
    }
}

/// Read/write access including reclamation; the seam the frontier cleans
/// through, so it works identically for one arena and for a lane set.
pub trait NodeStore<S>: NodeRead<S> {
    fn node_mut(&mut self, id: NodeId) -> &mut Node<S>;
    fn deallocate(&mut self, id: NodeId);
}

/// One lane's slab: append-only slots, O(1) free-list reuse, and a cursor that
/// lets `reset` recycle the backing storage without reallocating.
pub struct NodeArena<S> {
    lane: u32,
    slots: Vec<Node<S>>,
    free_head: Option<u32>,
    cursor: usize,
    free_len: usize,
}

impl<S> NodeArena<S> {
    pub fn new(lane: u32) -> Self {
        Self {
            lane,
            slots: Vec::new(),
            free_head: None,
            cursor: 0,
            free_len: 0,
        }
    }

    pub fn lane(&self) -> u32 {
        self.lane
    }

    /// Live node count.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots immediately reusable without growing backing storage.
    pub fn free_len(&self) -> usize {
        self.free_len
    }

    /// O(1) allocation: pop the free list, then recycle below the cursor,
    /// then grow. Grown storage never relocates existing slots' ids.
    pub fn allocate(&mut self, parent: Option<NodeId>, state: S) -> NodeId {
        let index = if let Some(index) = self.free_head {
            let slot = &mut self.slots[index as usize];
            self.free_head = slot.free_next;
            self.free_len -= 1;
            slot.parent = parent;
            slot.child = None;
            slot.sibling = None;
            slot.reward = 0;
            slot.liveness = Liveness::Live;
            slot.free_next = None;
            slot.state = state;
            index
        } else if self.cursor < self.slots.len() {
            let index = self.cursor as u32;
            self.cursor += 1;
            self.free_len -= 1;
            let slot = &mut self.slots[index as usize];
            slot.parent = parent;
            slot.child = None;
            slot.sibling = None;
            slot.reward = 0;
            slot.liveness = Liveness::Live;
            slot.free_next = None;
            slot.state = state;
            index
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Node {
                parent,
                child: None,
                sibling: None,
                reward: 0,
                liveness: Liveness::Live,
                free_next: None,
                state,
            });
            self.cursor = self.slots.len();
            index
        };
        NodeId {
            lane: self.lane,
            index,
        }
    }

    /// Logically discards every node. Backing storage is retained and reused
    /// through the cursor; all outstanding ids become invalid.
    pub fn reset(&mut self) {
        self.free_head = None;
        self.cursor = 0;
        self.free_len = self.slots.len();
    }
}

impl<S> NodeRead<S> for NodeArena<S> {
    fn node(&self, id: NodeId) -> &Node<S> {
        debug_assert_eq!(id.lane, self.lane);
        &self.slots[id.index as usize]
    }
}

impl<S> NodeStore<S> for NodeArena<S> {
    fn node_mut(&mut self, id: NodeId) -> &mut Node<S> {
        debug_assert_eq!(id.lane, self.lane);
        &mut self.slots[id.index as usize]
    }

    fn deallocate(&mut self, id: NodeId) {
        debug_assert_eq!(id.lane, self.lane);
        let free_head = self.free_head;
        let slot = &mut self.slots[id.index as usize];
        debug_assert!(slot.is_live(), "double deallocate of {id:?}");
        slot.liveness = Liveness::Dead;
        slot.free_next = free_head;
        self.free_head = Some(id.index);
        self.free_len += 1;
    }
}

/// N disjoint lanes. A lane can be checked out by value for the duration of a
/// parallel round, so concurrently running lanes never share allocation state,
/// and is restored at commit time.
pub struct LaneSet<S> {
    lanes: Vec<NodeArena<S>>,
}

impl<S> LaneSet<S> {
    pub fn new(lane_count: usize) -> Self {
        let lane_count = lane_count.max(1);
        Self {
            lanes: (0..lane_count).map(|i| NodeArena::new(i as u32)).collect(),
        }
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Total live node count across lanes.
    pub fn live_len(&self) -> usize {
        self.lanes.iter().map(NodeArena::len).sum()
    }

    /// Per-lane free-slot counts, the lane scheduler's load heuristic input.
    pub fn free_counts(&self) -> Vec<usize> {
        self.lanes.iter().map(NodeArena::free_len).collect()
    }

    pub fn allocate_in(&mut self, lane: u32, parent: Option<NodeId>, state: S) -> NodeId {
        self.lanes[lane as usize].allocate(parent, state)
    }

    /// Iterates every live node across the lanes, in lane then slot order.
    pub fn iter_live(&self) -> impl Iterator<Item = (NodeId, &Node<S>)> + '_ {
        self.lanes.iter().flat_map(|arena| {
            let lane = arena.lane;
            // live slots always sit below the cursor
            arena.slots[..arena.cursor]
                .iter()
                .enumerate()
                .filter(|(_, node)| node.is_live())
                .map(move |(index, node)| {
                    (
                        NodeId {
                            lane,
                            index: index as u32,
                        },
                        node,
                    )
                })
        })
    }

    /// Deallocates a whole subtree by walking the child/sibling chains with an
    /// explicit stack.
    pub fn deallocate_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let mut child = self.node(id).child;
            while let Some(c) = child {
                stack.push(c);
                child = self.node(c).sibling;
            }
            self.deallocate(id);
        }
    }

    /// Moves a lane's arena out for a round of lane-local allocation. Node
    /// lookups for that lane panic until [`LaneSet::restore`] puts it back.
    pub fn checkout(&mut self, lane: u32) -> NodeArena<S> {
        std::mem::replace(&mut self.lanes[lane as usize], NodeArena::new(lane))
    }

    pub fn restore(&mut self, arena: NodeArena<S>) {
        let lane = arena.lane() as usize;
        self.lanes[lane] = arena;
    }

    /// Logically empties every lane, resizing to `lane_count`. Backing storage
    /// is kept when the lane count is unchanged.
    pub fn reset(&mut self, lane_count: usize) {
        let lane_count = lane_count.max(1);
        if self.lanes.len() == lane_count {
            for lane in &mut self.lanes {
                lane.reset();
            }
        } else {
            self.lanes = (0..lane_count).map(|i| NodeArena::new(i as u32)).collect();
        }
    }
}

impl<S> NodeRead<S> for LaneSet<S> {
    fn node(&self, id: NodeId) -> &Node<S> {
        self.lanes[id.lane as usize].node(id)
    }
}

impl<S> NodeStore<S> for LaneSet<S> {
    fn node_mut(&mut self, id: NodeId) -> &mut Node<S> {
        self.lanes[id.lane as usize].node_mut(id)
    }

    fn deallocate(&mut self, id: NodeId) {
        self.lanes[id.lane as usize].deallocate(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_reuses_freed_slot() {
        let mut arena: NodeArena<u32> = NodeArena::new(0);
        let a = arena.allocate(None, 1);
        let b = arena.allocate(Some(a), 2);
        assert_eq!(arena.len(), 2);

        arena.deallocate(b);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.free_len(), 1);
        assert!(!arena.is_live(b));

        let c = arena.allocate(Some(a), 3);
        assert_eq!(c.index, b.index);
        assert!(arena.is_live(c));
        assert_eq!(arena.node(c).state, 3);
        assert_eq!(arena.free_len(), 0);
    }

    #[test]
    fn test_reset_recycles_backing_storage() {
        let mut arena: NodeArena<u32> = NodeArena::new(0);
        for i in 0..4 {
            arena.allocate(None, i);
        }
        arena.reset();
        assert_eq!(arena.len(), 0);
        assert_eq!(arena.free_len(), 4);

        let a = arena.allocate(None, 9);
        assert_eq!(a.index, 0);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.free_len(), 3);
    }

    #[test]
    fn test_lane_set_subtree_deallocation() {
        let mut lanes: LaneSet<u32> = LaneSet::new(2);
        let root = lanes.allocate_in(0, None, 0);
        let a = lanes.allocate_in(0, Some(root), 1);
        let b = lanes.allocate_in(1, Some(root), 2);
        let leaf = lanes.allocate_in(1, Some(a), 3);

        // link: root -> [b, a], a -> [leaf]
        lanes.node_mut(root).child = Some(a);
        lanes.node_mut(a).sibling = Some(b);
        lanes.node_mut(a).child = Some(leaf);

        assert_eq!(lanes.live_len(), 4);
        lanes.deallocate_subtree(root);
        assert_eq!(lanes.live_len(), 0);
        assert!(!lanes.is_live(leaf));
        assert!(!lanes.is_live(b));
    }

    #[test]
    fn test_checkout_restore_round_trip() {
        let mut lanes: LaneSet<u32> = LaneSet::new(2);
        let kept = lanes.allocate_in(0, None, 7);

        let mut arena = lanes.checkout(1);
        let fresh = arena.allocate(Some(kept), 8);
        lanes.restore(arena);

        assert_eq!(lanes.node(fresh).state, 8);
        assert_eq!(lanes.node(fresh).parent, Some(kept));
        assert_eq!(lanes.live_len(), 2);
        assert_eq!(lanes.free_counts(), vec![0, 0]);
    }
}
