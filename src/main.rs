#[macro_use]
extern crate log;

use std::fs::File;
use std::io::BufReader;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use coherence_sim::{CliArgs, CoherenceEngine, SimConfig, TraceReader};

pub fn main() -> Result<()> {
    env_logger::init();
    let args = CliArgs::parse();

    let config = SimConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    info!(
        "loaded configuration: {} hosts, {} switches, placement={:?}, migration={:?}",
        config.num_hosts,
        config.switch_ids.len(),
        config.placement_policy,
        config.migration_policy
    );

    let output_json = config.output_json.clone();
    let mut engine = CoherenceEngine::new(&config)?;

    let trace_file = File::open(&args.trace)
        .with_context(|| format!("opening trace file {}", args.trace.display()))?;
    let reader = TraceReader::new(BufReader::new(trace_file));

    let start = Instant::now();
    let mut processed = 0u64;
    for record in reader {
        let record = record?;
        engine.process(record.addr, record.op, record.requestor)?;
        processed += 1;
    }
    let elapsed = start.elapsed();
    info!(
        "processed {processed} transactions in {:.3} ms ({} requests replayed)",
        elapsed.as_millis() as f64,
        engine.reqid()
    );

    coherence_sim::write_flow_summary(&engine, &output_json)?;
    info!("wrote flow summary to {}", output_json.display());

    Ok(())
}
