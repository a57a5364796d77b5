use anyhow::Result;
use log::{debug, error, info, warn};
use particle_transport::input::{read_field, read_particles, write_final_positions};
use particle_transport::{RunState, TransportEngine};
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use transport_common::TransportConfig;

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting particle transport engine...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = TransportConfig::load(&config_path)?;
    let params = config.get_run_params();
    debug!("Run parameters: {:#?}", params);
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Load Inputs ---
    let load_start = Instant::now();
    let field = Arc::new(read_field(&config.input.field_csv)?);
    let particles = read_particles(&config.input.particles_csv)?;
    info!(
        "Loaded {} grid cells and {} particles in {:.2} s.",
        field.len(),
        particles.len(),
        load_start.elapsed().as_secs_f64()
    );

    // --- Build Engine and Run ---
    let engine = TransportEngine::new(field, params)?;
    let output = match engine.run(&particles) {
        Ok(output) => output,
        Err(e) => {
            error!("Transport run failed: {}", e);
            anyhow::bail!("Transport run failed.");
        }
    };

    let summary = output.summary(engine.params(), false);
    info!(
        "Run {}: {} of {} steps, {:.1} h simulated, {:.1}% of particles stopped.",
        summary.termination,
        summary.executed_steps,
        summary.horizon,
        summary.simulated_seconds / 3600.0,
        summary.stopped_fraction() * 100.0
    );
    if output.state == RunState::HorizonReached && summary.stopped_count == 0 {
        warn!("No particle stopped during the run.");
    }

    // --- Save Results ---
    if config.output.save_summary {
        let filename = format!("{}_summary.json", config.output.base_filename);
        match File::create(&filename) {
            Ok(mut file) => match serde_json::to_string_pretty(&summary) {
                Ok(json_string) => {
                    if let Err(e) = file.write_all(json_string.as_bytes()) {
                        error!("Error writing summary JSON to file '{}': {}", filename, e);
                    } else {
                        info!("Run summary saved to {}", filename);
                    }
                }
                Err(e) => error!("Error serializing summary to JSON: {}", e),
            },
            Err(e) => error!("Error creating summary file '{}': {}", filename, e),
        }
    } else {
        info!("Skipping run summary as per config.");
    }

    if config.output.save_final_positions {
        let filename = format!("{}_final_positions.csv", config.output.base_filename);
        match File::create(&filename) {
            Ok(file) => {
                write_final_positions(file, &output)?;
                info!("Final positions saved to {}", filename);
            }
            Err(e) => error!("Error saving CSV file '{}': {}", filename, e),
        }
    } else {
        info!("Skipping saving final positions as per config.");
    }

    info!("Transport run complete.");
    Ok(())
}
