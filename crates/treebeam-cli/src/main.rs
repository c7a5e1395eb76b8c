//! Demo drivers for the treebeam engine.
//!
//! Two toy decision problems exercise the parallel controller end to end:
//! `password` is dedup-heavy with a tiny branching factor, `sudoku` is
//! branchy enough to hit the node limit and the beam pruner.

mod fnv;
mod password;
mod pool;
mod sudoku;

use anyhow::Result;
use clap::Parser as _;

#[derive(clap::Parser, Debug)]
#[command(about = "incremental tree-search demos", version)]
struct Cli {
    /// Verbose engine logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Hill-climb four saturating digits toward a hidden password
    Password {
        /// Worker threads
        #[arg(long, default_value_t = 4)]
        threads: usize,
        /// Think time per decision in milliseconds
        #[arg(long, default_value_t = 100)]
        tick_ms: u64,
    },
    /// Fill a 9x9 sudoku board starting from empty
    Sudoku {
        /// Worker threads
        #[arg(long, default_value_t = 1)]
        threads: usize,
        /// Think time per decision in milliseconds
        #[arg(long, default_value_t = 10)]
        tick_ms: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match cli.command {
        Command::Password { threads, tick_ms } => password::run(threads, tick_ms),
        Command::Sudoku { threads, tick_ms } => sudoku::run(threads, tick_ms),
    }
}
