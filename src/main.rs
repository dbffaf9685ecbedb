use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, trace};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use stemcell_common::SimulationConfig;
use stemcell_engine::Simulation;

/// Command-line arguments for the simulation engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the configured tick limit
    #[arg(long)]
    max_ticks: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Starting stem cell simulation engine...");

    // --- Load Configuration ---
    let mut config = SimulationConfig::load(&args.config)?;
    if let Some(seed) = args.seed {
        config.universe.seed = seed;
    }
    if let Some(max_ticks) = args.max_ticks {
        config.timing.max_ticks = max_ticks;
    }
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Simulation ---
    let mut sim = Simulation::new(config)?;
    debug!("Simulation Parameters: {:#?}", sim.params());

    let max_ticks = sim.config().timing.max_ticks;
    let snapshot_interval = sim.config().timing.snapshot_interval.max(1);
    info!("Recording snapshot every {} ticks, at most {} ticks.", snapshot_interval, max_ticks);

    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    sim.record_snapshot();

    while sim.is_running() {
        let step_start_time = Instant::now();
        if let Err(e) = sim.step() {
            error!("Error during simulation tick {}: {:#}", sim.tick(), e);
            anyhow::bail!("Simulation tick failed.");
        }
        let step_duration = step_start_time.elapsed();
        let tick = sim.tick();

        if tick % snapshot_interval == 0 || !sim.is_running() {
            sim.record_snapshot();
        }

        // Print status periodically
        let now = Instant::now();
        if now.duration_since(previous_print_time).as_secs_f64() >= 5.0 || !sim.is_running() {
            let snapshot = sim.snapshot();
            info!(
                "Tick [{}/{}] | Stem cells: {} ({} differentiated) | Contacts: {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                tick,
                max_ticks,
                snapshot.stem_cells.total(),
                snapshot.stem_cells.differentiated(),
                snapshot.contact_edges,
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = now;
        } else {
            trace!("Tick [{}/{}] completed in {:.2} ms", tick, max_ticks, step_duration.as_secs_f64() * 1000.0);
        }
    }

    info!("Simulation finished after {} ticks in {:.3} seconds.", sim.tick(), start_time.elapsed().as_secs_f64());

    // --- Save Final State ---
    let base = sim.config().output.base_filename.clone();
    if sim.config().output.save_final_state {
        let filename = format!("{}_final_state.csv", base);
        let mut writer = csv::Writer::from_path(&filename)
            .with_context(|| format!("Failed to create '{}'", filename))?;
        writer.write_record(["id", "kind", "x", "y", "label"])?;
        for agent in sim.population().agents() {
            let label = agent.label().map(|l| l.as_str()).unwrap_or("");
            writer.write_record([
                agent.id.to_string(),
                agent.kind().as_str().to_string(),
                format!("{:.4}", agent.position.x),
                format!("{:.4}", agent.position.y),
                label.to_string(),
            ])?;
        }
        writer.flush()?;
        info!("Final state of {} agents saved to {}", sim.population().len(), filename);
    } else {
        info!("Skipping final state as per config.");
    }

    if sim.config().output.save_summary {
        let filename = format!("{}_summary.json", base);
        let summary = sim.get_recorded_snapshots().last().cloned().unwrap_or_else(|| sim.snapshot());
        let json = serde_json::to_string_pretty(&summary)?;
        let mut file = File::create(&filename).with_context(|| format!("Failed to create '{}'", filename))?;
        file.write_all(json.as_bytes())?;
        info!("Summary saved to {}", filename);
    } else {
        info!("Skipping summary as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}
