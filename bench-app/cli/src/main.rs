//! iobench Command Line Interface
//!
//! Persists a 1 GiB payload with one strategy and reports how long the
//! write-then-read took.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use std::io::Write;

use iobench::{Bench, BenchConfig};

/// iobench - compare C stdio, stream and memory-mapped persistence
#[derive(Parser, Debug)]
#[command(
    name = "iobench",
    about = "Time a write-then-read of a large payload with one I/O strategy",
    version = env!("CARGO_PKG_VERSION"),
    author = "iobench Contributors"
)]
struct Cli {
    /// Strategy to run: `c`, `cpp` or `mmf` (exact match; anything else runs nothing)
    token: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let log_level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .init();

    info!("iobench CLI v{} starting...", env!("CARGO_PKG_VERSION"));

    run(cli, BenchConfig::default())
}

fn run(cli: Cli, config: BenchConfig) -> Result<()> {
    let bench = Bench::new(config);
    eprintln!("Input data size = {}", bench.input_size());

    let report = bench.dispatch(&cli.token).with_context(|| {
        format!(
            "Strategy '{}' failed on {}",
            cli.token,
            bench.config().path.display()
        )
    })?;

    let mut stderr = std::io::stderr().lock();
    report
        .write_summary(&mut stderr)
        .context("Failed to write run summary")?;
    stderr.flush()?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
        println!("{}", json);
    }

    Ok(())
}
