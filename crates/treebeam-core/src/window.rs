//! The sliding window of per-depth frontiers.

use crate::arena::NodeId;
use crate::frontier::DepthFrontier;

/// `depth + 1` frontiers; index 0 is the current root's depth. Slides forward
/// by one position every tick the controller can reuse prior work.
pub struct SearchWindow {
    depths: Vec<DepthFrontier>,
    dedup: bool,
}

impl SearchWindow {
    /// A window with no frontiers; any tree operation first requires a rebuild.
    pub fn empty() -> Self {
        Self {
            depths: Vec::new(),
            dedup: false,
        }
    }

    pub fn new(depth: usize, dedup: bool) -> Self {
        Self {
            depths: (0..=depth).map(|_| DepthFrontier::new(dedup)).collect(),
            dedup,
        }
    }

    pub fn depth_count(&self) -> usize {
        self.depths.len()
    }

    pub fn depth(&self, index: usize) -> &DepthFrontier {
        &self.depths[index]
    }

    pub fn depth_mut(&mut self, index: usize) -> &mut DepthFrontier {
        &mut self.depths[index]
    }

    /// Drops depth 0, shifts every remaining depth down one slot and appends a
    /// fresh empty frontier at the tail; the window length is invariant.
    pub fn slide(&mut self) {
        self.depths.remove(0);
        self.depths.push(DepthFrontier::new(self.dedup));
    }

    /// Shallowest depth at or below which pruning may act that still holds more
    /// than one live node.
    pub fn first_active(&self, min_depth: usize) -> Option<usize> {
        (min_depth..self.depths.len()).find(|&i| self.depths[i].total_len() > 1)
    }

    /// Deepest depth holding unexpanded content.
    pub fn last_active(&self) -> Option<usize> {
        (0..self.depths.len()).rev().find(|&i| !self.depths[i].unsearched_is_empty())
    }

    /// Best-scored unexpanded node at the deepest active depth.
    pub fn best_leaf(&self) -> Option<(usize, NodeId)> {
        let depth = self.last_active()?;
        let (id, _) = self.depths[depth].peek_best()?;
        Some((depth, id))
    }

    pub fn collisions(&self) -> u64 {
        self.depths.iter().map(DepthFrontier::collisions).sum()
    }
}
