//! rankgraph CLI: export the next batch of uploads into the ranking graph.

use anyhow::Result;
use clap::Parser;
use rankgraph::engine::arg_parser::Cli;
use rankgraph::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
