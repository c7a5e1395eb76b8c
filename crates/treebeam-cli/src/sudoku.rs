//! Sudoku demo: fill a 9x9 board from empty, one cell assignment per
//! decision, scored by how many distinct digits each row, column and block
//! holds. A branchy domain (up to 729 children per node) that leans on the
//! node limit and beam pruning rather than on deduplication.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel as chan;
use log::info;
use treebeam_core::{ParallelSearcher, SearchConfig, SearchState};

use crate::fnv::fnv1a;
use crate::pool::ThreadPool;

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Decision {
    x: u8,
    y: u8,
    number: u8,
}

#[derive(Clone, Debug)]
pub struct SudokuState {
    /// Indexed `[column][row]`; 0 is an empty cell.
    board: [[u8; 9]; 9],
    decision: Decision,
    last_decision: Decision,
}

impl PartialEq for SudokuState {
    fn eq(&self, other: &Self) -> bool {
        self.board == other.board
    }
}

impl SearchState for SudokuState {
    fn state_key(&self) -> u64 {
        fnv1a(self.board.iter().flatten().copied())
    }
}

impl SudokuState {
    fn start() -> Self {
        Self {
            board: [[0; 9]; 9],
            decision: Decision::default(),
            last_decision: Decision::default(),
        }
    }

    /// Distinct digits among the cells yielded by `cells`.
    fn distinct(&self, cells: impl Iterator<Item = (usize, usize)>) -> u32 {
        let mut seen = [false; 10];
        for (x, y) in cells {
            seen[self.board[x][y] as usize] = true;
        }
        seen[1..].iter().map(|&s| u32::from(s)).sum()
    }

    fn column_distinct(&self, column: usize) -> u32 {
        self.distinct((0..9).map(move |row| (column, row)))
    }

    fn row_distinct(&self, row: usize) -> u32 {
        self.distinct((0..9).map(move |column| (column, row)))
    }

    fn block_distinct(&self, block: usize) -> u32 {
        let col_start = (block * 3) % 9;
        let row_start = (block / 3) * 3;
        self.distinct(
            (col_start..col_start + 3)
                .flat_map(move |x| (row_start..row_start + 3).map(move |y| (x, y))),
        )
    }

    fn zero_count(&self) -> u32 {
        self.board
            .iter()
            .flatten()
            .map(|&cell| u32::from(cell == 0))
            .sum()
    }

    pub fn is_solved(&self) -> bool {
        (0..9).all(|i| {
            self.block_distinct(i) + self.row_distinct(i) + self.column_distinct(i) == 27
        })
    }

    fn child(&self, decision: Decision) -> Self {
        let mut next = self.clone();
        next.last_decision = next.decision;
        next.decision = decision;
        next.board[decision.x as usize][decision.y as usize] = decision.number;
        next
    }

    fn score(&self) -> f64 {
        if self.decision == self.last_decision {
            // repeating a decision is a stalled branch
            return -99_999.0;
        }
        let filled: u32 = (0..9)
            .map(|i| self.block_distinct(i) + self.row_distinct(i) + self.column_distinct(i))
            .sum();
        f64::from(filled) - f64::from(self.zero_count()) * 99_999.0
    }
}

/// Every (cell, digit) assignment; filling an already-matching cell is skipped
/// at expansion time.
fn all_moves() -> Vec<Decision> {
    let mut moves = Vec::with_capacity(9 * 9 * 9);
    for x in 0..9u8 {
        for y in 0..9u8 {
            for number in 1..=9u8 {
                moves.push(Decision { x, y, number });
            }
        }
    }
    moves
}

pub fn run(threads: usize, tick_ms: u64) -> Result<()> {
    let pool = ThreadPool::new(threads);
    let mut searcher = ParallelSearcher::new(SearchConfig {
        depth: 5,
        depth_task_size: 1,
        award_width: 250,
        prune_width: 500,
        node_limit: 1_000_000,
        ..SearchConfig::default()
    });

    let mut current = SudokuState::start();
    let mut attempts = 0u64;
    while !current.is_solved() {
        if !searcher.try_advance() {
            searcher.reset(&current, pool.size());
        }
        let deadline = Instant::now() + Duration::from_millis(tick_ms);
        while Instant::now() < deadline {
            if searcher.is_search_complete() {
                break;
            }
            let batches = searcher.take_batches()?;
            if batches.is_empty() {
                searcher.finalize();
                continue;
            }
            let (done_tx, done_rx) = chan::unbounded();
            for mut batch in batches {
                let done = done_tx.clone();
                pool.enqueue(move || {
                    let moves = all_moves();
                    for tasks in batch.take_tasks() {
                        for parent in &tasks.parents {
                            for &decision in &moves {
                                let cell = parent.state.board[decision.x as usize]
                                    [decision.y as usize];
                                if cell == decision.number {
                                    continue;
                                }
                                let child = parent.state.child(decision);
                                let score = child.score();
                                batch.push_child(tasks.depth + 1, parent.id, child, score);
                            }
                        }
                    }
                    let _ = done.send(batch);
                });
            }
            pool.wait();
            searcher.commit(done_rx.try_iter().collect());
            searcher.finalize();
        }

        let best = searcher
            .best_state()
            .context("search produced no candidate decision")?
            .clone();
        attempts += 1;
        info!(
            "attempt {attempts}: set ({}, {}) = {} ({} live of {} generated nodes)",
            best.decision.x,
            best.decision.y,
            best.decision.number,
            searcher.live_nodes(),
            searcher.total_nodes(),
        );
        current = best;
        print_board(&current);
    }
    println!("solved in {attempts} decisions");
    Ok(())
}

fn print_board(state: &SudokuState) {
    for y in 0..9 {
        let row: Vec<String> = (0..9).map(|x| state.board[x][y].to_string()).collect();
        println!(" {}", row.join(" "));
    }
    println!();
}
