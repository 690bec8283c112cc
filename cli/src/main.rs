mod trace;

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use cache_sim::{config::SimConfig, sim::Simulator};
use clap::Parser;

use crate::trace::TraceReader;

/// Replay a memory-access trace through a simulated cache hierarchy.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File path to the access trace (`-` to read stdin)
    trace: PathBuf,
    /// Simulate N harts
    #[arg(short = 'p', value_name = "N", default_value_t = 1)]
    harts: usize,
    /// Instruction cache with S sets, W ways and B-byte blocks (S and B powers of 2)
    #[arg(long = "ic", value_name = "S:W:B")]
    icache: Option<String>,
    /// Data cache with S sets, W ways and B-byte blocks (S and B powers of 2)
    #[arg(long = "dc", value_name = "S:W:B")]
    dcache: Option<String>,
    /// Shared L2 cache with S sets, W ways and B-byte blocks (S and B powers of 2)
    #[arg(long = "l2", value_name = "S:W:B")]
    l2: Option<String>,
    /// File path to write statistics to as JSON
    #[arg(long)]
    json: Option<PathBuf>,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let Cli {
        trace,
        harts,
        icache,
        dcache,
        l2,
        json,
        verbose,
    } = Cli::parse();
    if verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }
    ensure!(harts > 0, "at least one hart must be simulated");

    let config = SimConfig::parse(harts, icache.as_deref(), dcache.as_deref(), l2.as_deref())?;
    let mut sim = Simulator::new(config)?;
    let input = open_trace(&trace)?;
    execute(&mut sim, TraceReader::new(input))?;
    log::info!("finished execution.");
    for hart in 0..sim.num_harts() {
        log::info!("hart {hart}: {} accesses retired", sim.retired(hart).unwrap_or(0));
    }
    output_stat(&sim, json)
}

fn open_trace(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn execute<R: BufRead>(sim: &mut Simulator, records: TraceReader<R>) -> Result<()> {
    for record in records {
        let record = record?;
        sim.retire(record.hart, record.event)
            .with_context(|| format!("failed to simulate {}", record.event))?;
    }
    Ok(())
}

fn output_stat(sim: &Simulator, json: Option<PathBuf>) -> Result<()> {
    let mut out = io::stdout().lock();
    sim.print_stats(&mut out)?;
    out.flush()?;
    if let Some(path) = json {
        let mut file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        sim.collect_stat().write_json(&mut file)?;
        writeln!(file)?;
        log::info!("statistics written to {}", path.display());
    }
    Ok(())
}
