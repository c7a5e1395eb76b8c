//! Lane scheduling: partitions pending frontier work across arena lanes.
//!
//! Issuance starts at the lane with the most spare capacity. Once a lane has
//! accumulated `depth_task_size` assigned nodes, issuance moves to the lane
//! maximizing spare capacity minus already-assigned work, balancing headroom
//! against queued load. The terminal depth is never drained; it exists only
//! for finalization.

use crate::arena::NodeRead;
use crate::search::parallel::{DepthTasks, ParentTask};
use crate::state::SearchState;
use crate::window::SearchWindow;

/// Work assigned to one lane for a round, before its arena is checked out.
pub(crate) struct LanePlan<S> {
    pub lane: u32,
    pub tasks: Vec<DepthTasks<S>>,
}

/// First index with the maximum value; ties go to the lowest lane.
fn argmax_first(values: impl Iterator<Item = i64>) -> usize {
    let mut best = 0;
    let mut best_value = i64::MIN;
    for (i, value) in values.enumerate() {
        if value > best_value {
            best_value = value;
            best = i;
        }
    }
    best
}

/// Drains up to `depth_task_size` nodes per depth out of `window`, cloning each
/// parent's state into the plan so lane workers never read foreign arenas.
/// Lanes with no assigned work are omitted.
pub(crate) fn partition<S: SearchState>(
    window: &mut SearchWindow,
    store: &impl NodeRead<S>,
    free_counts: &[usize],
    depth_task_size: usize,
) -> Vec<LanePlan<S>> {
    let depth_count = window.depth_count();
    if depth_count < 2 {
        return Vec::new();
    }
    let depth_task_size = depth_task_size.max(1);

    let mut plans: Vec<LanePlan<S>> = (0..free_counts.len())
        .map(|lane| LanePlan {
            lane: lane as u32,
            tasks: Vec::new(),
        })
        .collect();
    let mut assigned = vec![0usize; free_counts.len()];
    let mut current = argmax_first(free_counts.iter().map(|&f| f as i64));

    for depth in 0..depth_count - 1 {
        if window.depth(depth).unsearched_is_empty() {
            continue;
        }
        let mut added = 0;
        while added < depth_task_size {
            let Some((id, _)) = window.depth_mut(depth).pop_best() else {
                break;
            };
            let state = store.node(id).state.clone();
            let plan = &mut plans[current];
            match plan.tasks.last_mut() {
                Some(tasks) if tasks.depth == depth => tasks.parents.push(ParentTask { id, state }),
                _ => plan.tasks.push(DepthTasks {
                    depth,
                    parents: vec![ParentTask { id, state }],
                }),
            }
            added += 1;
            assigned[current] += 1;
        }
        if assigned[current] >= depth_task_size {
            current = argmax_first(
                free_counts
                    .iter()
                    .zip(&assigned)
                    .map(|(&free, &used)| free as i64 - used as i64),
            );
        }
    }

    plans.retain(|plan| !plan.tasks.is_empty());
    plans
}
