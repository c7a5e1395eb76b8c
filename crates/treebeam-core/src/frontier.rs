//! Per-depth candidate scheduling.
//!
//! `ScoreQueue` orders not-yet-expanded nodes max-score-first with stable ties;
//! `DepthFrontier` adds expanded-node bookkeeping and, where enabled, a
//! depth-scoped transposition table that rejects caller-equal duplicates.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use smallvec::SmallVec;

use crate::arena::{NodeId, NodeRead, NodeStore};
use crate::state::SearchState;

#[derive(Clone, Copy, Debug)]
struct Entry {
    node: NodeId,
    score: f64,
    seq: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-score first; equal scores pop in insertion order.
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Max-heap of scored node ids with stable tie-breaking and bulk filtering.
#[derive(Default)]
pub struct ScoreQueue {
    heap: BinaryHeap<Entry>,
    seq: u64,
}

impl ScoreQueue {
    pub fn push(&mut self, node: NodeId, score: f64) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Entry { node, score, seq });
    }

    pub fn pop(&mut self) -> Option<(NodeId, f64)> {
        self.heap.pop().map(|e| (e.node, e.score))
    }

    pub fn peek(&self) -> Option<(NodeId, f64)> {
        self.heap.peek().map(|e| (e.node, e.score))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Export, filter, re-heapify. Entries for which `keep` returns false are
    /// dropped; the closure may run side effects (deallocation).
    pub fn retain(&mut self, mut keep: impl FnMut(NodeId) -> bool) {
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        entries.retain(|e| keep(e.node));
        self.heap = BinaryHeap::from(entries);
    }
}

type Bucket = SmallVec<[NodeId; 4]>;

/// One depth of the search window.
///
/// `unsearched` holds candidates not yet expanded, `searched` nodes already
/// handed out as tasks (retained until cleanup so they are never re-issued).
pub struct DepthFrontier {
    unsearched: ScoreQueue,
    searched: Vec<NodeId>,
    transposition: Option<HashMap<u64, Bucket>>,
    collisions: u64,
}

impl DepthFrontier {
    pub fn new(dedup: bool) -> Self {
        Self {
            unsearched: ScoreQueue::default(),
            searched: Vec::new(),
            transposition: dedup.then(HashMap::new),
            collisions: 0,
        }
    }

    /// Inserts a candidate, max-score first. With deduplication enabled the
    /// node is rejected (returns `false`, nothing stored) when a live
    /// caller-equal node already sits at this depth; the caller returns the
    /// rejected node to its arena.
    pub fn push<S: SearchState>(
        &mut self,
        id: NodeId,
        score: f64,
        store: &impl NodeRead<S>,
    ) -> bool {
        if let Some(table) = &mut self.transposition {
            let key = store.node(id).state.state_key();
            let bucket = table.entry(key).or_default();
            for &existing in bucket.iter() {
                if store.is_live(existing) && store.node(existing).state == store.node(id).state {
                    self.collisions += 1;
                    return false;
                }
            }
            bucket.push(id);
        }
        self.unsearched.push(id, score);
        true
    }

    /// Removes and returns the best unsearched node, recording it as searched.
    pub fn pop_best(&mut self) -> Option<(NodeId, f64)> {
        let (id, score) = self.unsearched.pop()?;
        self.searched.push(id);
        Some((id, score))
    }

    pub fn peek_best(&self) -> Option<(NodeId, f64)> {
        self.unsearched.peek()
    }

    /// The single node at a collapsed depth (the root), expanded or not.
    pub fn sole_node(&self) -> Option<NodeId> {
        debug_assert!(self.total_len() <= 1, "sole_node on a multi-node depth");
        self.searched
            .first()
            .copied()
            .or_else(|| self.unsearched.peek().map(|(id, _)| id))
    }

    /// The `k` best unsearched entries, best first. Re-inserts what it pops,
    /// so the frontier content is unchanged.
    pub fn top_k(&mut self, k: usize) -> Vec<(NodeId, f64)> {
        let mut top = Vec::with_capacity(k.min(self.unsearched.len()));
        while top.len() < k {
            match self.unsearched.pop() {
                Some(entry) => top.push(entry),
                None => break,
            }
        }
        for &(id, score) in &top {
            self.unsearched.push(id, score);
        }
        top
    }

    pub fn unsearched_len(&self) -> usize {
        self.unsearched.len()
    }

    pub fn unsearched_is_empty(&self) -> bool {
        self.unsearched.is_empty()
    }

    /// Live content at this depth, searched and unsearched.
    pub fn total_len(&self) -> usize {
        self.unsearched.len() + self.searched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    /// Discards every node at this depth except `survivor`, deallocating the
    /// losers. Used to collapse a depth down to one surviving branch.
    pub fn filter<S>(&mut self, survivor: NodeId, store: &mut impl NodeStore<S>) {
        self.unsearched.retain(|id| {
            if id == survivor {
                true
            } else {
                store.deallocate(id);
                false
            }
        });
        self.searched.retain(|&id| {
            if id == survivor {
                true
            } else {
                store.deallocate(id);
                false
            }
        });
        self.sweep_transposition(store);
    }

    /// Cascading orphan reclamation: drops stale references to dead nodes and
    /// deallocates live nodes whose parent is dead. Running this over depths in
    /// increasing order cascades the reclamation down the window.
    pub fn cleanup<S>(&mut self, store: &mut impl NodeStore<S>) {
        if self.is_empty() {
            return;
        }
        fn keep<S>(store: &mut impl NodeStore<S>, id: NodeId) -> bool {
            if !store.is_live(id) {
                return false;
            }
            match store.node(id).parent {
                Some(parent) if !store.is_live(parent) => {
                    store.deallocate(id);
                    false
                }
                _ => true,
            }
        }
        self.unsearched.retain(|id| keep(store, id));
        self.searched.retain(|&id| keep(store, id));
        self.sweep_transposition(store);
    }

    /// Drops dead references from the transposition table; empty buckets are
    /// removed. Nodes here were already reclaimed through the candidate sets.
    fn sweep_transposition<S>(&mut self, store: &impl NodeRead<S>) {
        if let Some(table) = &mut self.transposition {
            table.retain(|_, bucket| {
                bucket.retain(|&mut id| store.is_live(id));
                !bucket.is_empty()
            });
        }
    }
}
