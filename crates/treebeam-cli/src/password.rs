//! Password demo: hill-climb four saturating `i8` digits toward a hidden
//! target, one combined -1/0/+1 nudge per digit per decision.
//!
//! Exercises the search under heavy transposition pressure: many move
//! sequences reach the same four digits, so most generated children are
//! rejected by the per-depth tables.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel as chan;
use log::{debug, info};
use treebeam_core::{ParallelSearcher, SearchConfig, SearchState};

use crate::fnv::fnv1a;
use crate::pool::ThreadPool;

const TARGET: [i8; 4] = [-127, 28, 39, 127];
const MOVE_COUNT: usize = 81;

#[derive(Clone, Debug)]
pub struct WordState {
    password: [i8; 4],
    decision: [i8; 4],
    dead: bool,
}

/// Identity is the digits alone: two states reached through different
/// decisions are the same position.
impl PartialEq for WordState {
    fn eq(&self, other: &Self) -> bool {
        self.password == other.password
    }
}

impl SearchState for WordState {
    fn state_key(&self) -> u64 {
        fnv1a(self.password.iter().map(|&d| d as u8))
    }
}

impl WordState {
    fn start() -> Self {
        Self {
            password: [0; 4],
            decision: [0; 4],
            dead: false,
        }
    }

    fn child(&self, step: [i8; 4]) -> Self {
        let mut password = self.password;
        for (digit, delta) in password.iter_mut().zip(step) {
            *digit = digit.saturating_add(delta);
        }
        Self {
            password,
            decision: step,
            // the all-zero move leads nowhere and never gets expanded
            dead: step == [0; 4],
        }
    }

    fn score(&self) -> f64 {
        self.password
            .iter()
            .zip(TARGET)
            .filter(|&(&digit, target)| digit == target)
            .count() as f64
    }
}

/// Every -1/0/+1 combination across the four digits.
fn all_moves() -> [[i8; 4]; MOVE_COUNT] {
    let mut moves = [[0i8; 4]; MOVE_COUNT];
    let mut index = 0;
    for a in -1..=1 {
        for b in -1..=1 {
            for c in -1..=1 {
                for d in -1..=1 {
                    moves[index] = [a, b, c, d];
                    index += 1;
                }
            }
        }
    }
    moves
}

pub fn run(threads: usize, tick_ms: u64) -> Result<()> {
    let pool = ThreadPool::new(threads);
    let mut searcher = ParallelSearcher::new(SearchConfig {
        depth: 7,
        award_width: 25,
        ..SearchConfig::default()
    });
    let moves = all_moves();

    let mut current = WordState::start();
    let mut attempts = 0u64;
    while current.password != TARGET {
        if !searcher.try_advance() {
            searcher.reset(&current, pool.size());
        }
        let deadline = Instant::now() + Duration::from_millis(tick_ms);
        while !searcher.is_releasable() || Instant::now() < deadline {
            if searcher.is_search_complete() {
                break;
            }
            let batches = searcher.take_batches()?;
            if batches.is_empty() {
                searcher.finalize();
                continue;
            }
            let round = batches.len();
            let (done_tx, done_rx) = chan::unbounded();
            for mut batch in batches {
                let done = done_tx.clone();
                pool.enqueue(move || {
                    for tasks in batch.take_tasks() {
                        for parent in &tasks.parents {
                            if parent.state.dead {
                                continue;
                            }
                            for step in moves {
                                let child = parent.state.child(step);
                                let score = child.score();
                                batch.push_child(tasks.depth + 1, parent.id, child, score);
                            }
                        }
                    }
                    let _ = done.send(batch);
                });
            }
            pool.wait();
            let done: Vec<_> = done_rx.try_iter().collect();
            debug_assert_eq!(done.len(), round);
            searcher.commit(done);
            searcher.finalize();
        }

        let decision = searcher
            .best_state()
            .context("search produced no candidate decision")?
            .decision;
        current = current.child(decision);
        attempts += 1;
        info!(
            "attempt {attempts}: decision {decision:?}, password {:?} ({} live nodes, {} collisions)",
            current.password,
            searcher.live_nodes(),
            searcher.collisions(),
        );
    }
    println!("cracked {TARGET:?} in {attempts} decisions");
    debug!("total duplicate states rejected: {}", searcher.collisions());
    Ok(())
}
