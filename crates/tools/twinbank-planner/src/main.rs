//! Twinbank Planner executable.

use clap::Parser;
use twinbank_layout::Anyhow;

pub mod cli;
pub mod config;
pub mod logging;

fn main() -> Anyhow<()> {
    let args = cli::Args::parse();
    logging::init_logging(args.verbose);
    cli::run(args)
}
