//! End-to-end parallel driving: batches fan out to real threads, funnel back
//! through a single commit, and the engine converges over repeated decisions.

use treebeam_core::{ParallelSearcher, SearchConfig, SearchState};

const TARGET: i32 = 4;

/// Walk on the number line; one decision moves the position by -1/0/+1.
#[derive(Clone, PartialEq, Debug)]
struct Walk(i32);

impl SearchState for Walk {
    fn state_key(&self) -> u64 {
        self.0 as u64
    }
}

fn score(value: i32) -> f64 {
    -f64::from((value - TARGET).abs())
}

/// Expands every issued batch on its own thread until the tick has nothing
/// left to do. Returns the number of worker rounds driven.
fn drive_tick(searcher: &mut ParallelSearcher<Walk>) -> usize {
    let mut rounds = 0;
    loop {
        if searcher.is_search_complete() {
            return rounds;
        }
        let batches = searcher.take_batches().expect("node limit is generous");
        if batches.is_empty() {
            searcher.finalize();
            continue;
        }
        rounds += 1;
        let done: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = batches
                .into_iter()
                .map(|mut batch| {
                    scope.spawn(move || {
                        for tasks in batch.take_tasks() {
                            for parent in &tasks.parents {
                                for step in [-1, 0, 1] {
                                    let child = Walk(parent.state.0 + step);
                                    let value = score(child.0);
                                    batch.push_child(tasks.depth + 1, parent.id, child, value);
                                }
                            }
                        }
                        batch
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("worker must not panic"))
                .collect()
        });
        searcher.commit(done);
        searcher.finalize();
    }
}

#[test]
fn test_converges_to_target_across_decisions() {
    let mut searcher = ParallelSearcher::new(SearchConfig {
        depth: 3,
        node_limit: 10_000,
        ..SearchConfig::default()
    });

    let mut world = Walk(0);
    let mut decisions = 0;
    while world != Walk(TARGET) {
        decisions += 1;
        assert!(decisions <= 20, "search failed to converge");
        if !searcher.try_advance() {
            searcher.reset(&world, 2);
        }
        drive_tick(&mut searcher);
        world = searcher
            .best_state()
            .expect("a searched tree yields a decision")
            .clone();
    }

    // one step closer per decision, no detours
    assert_eq!(decisions, TARGET);
    assert_eq!(searcher.lane_count(), 2);
    // overlapping walks at equal depth were deduplicated
    assert!(searcher.collisions() > 0);
}

#[test]
fn test_advance_retains_deeper_work() {
    let mut searcher = ParallelSearcher::new(SearchConfig {
        depth: 3,
        node_limit: 10_000,
        ..SearchConfig::default()
    });
    searcher.reset(&Walk(0), 2);
    drive_tick(&mut searcher);
    assert!(searcher.is_releasable());

    assert!(searcher.try_advance());
    // the committed branch carried its subtree across the slide: the new root
    // is the +1 step and the retained leaves already recommend the next one
    assert!(searcher.live_nodes() > 1);
    assert_eq!(searcher.best_state(), Some(&Walk(2)));
}
