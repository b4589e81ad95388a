use anyhow::Result;
use log::{debug, error, info, trace};
use std::fs::File;
use std::io::Write;
use std::time::Instant;

// Define modules used by main
mod grid;
mod simulation;
mod stats;

use contagion_common::SimulationConfig;
use simulation::Simulation;

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Contagion Engine...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = SimulationConfig::load(&config_path)?;

    info!("Using {} Rayon threads for statistics scans.", rayon::current_num_threads());

    // --- Initialize Simulation ---
    info!("Initializing simulation grid...");
    let mut sim = Simulation::new(config)?;
    sim.randomize();
    info!(
        "Grid randomized: {}x{} cells, {} occupants ({} infected seeds).",
        sim.params().cells_x,
        sim.params().cells_y,
        sim.counts().occupants(),
        sim.counts().infected
    );
    debug!("Simulation Parameters: {:#?}", sim.params()); // More detailed params at debug level

    let total_steps = sim.config().timing.max_steps;
    let record_interval_steps = sim.params().sample_interval_steps;
    let stop_when_concluded = sim.config().timing.stop_when_concluded;
    info!("Recording snapshot every {} rounds.", record_interval_steps);

    // --- Simulation Loop ---
    info!("Starting simulation loop for up to {} rounds...", total_steps);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    // --- Initial Snapshot (round = 0) ---
    info!("Recording initial snapshot (round 0)...");
    sim.record_snapshot();

    for step in 0..total_steps {
        let step_start_time = Instant::now();
        let counts = sim.step();
        let step_duration = step_start_time.elapsed();

        // Print status periodically
        let current_time = Instant::now();
        let print_interval_secs = 5.0;
        let should_print_status =
            current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs;
        let is_record_step = (step + 1) % record_interval_steps == 0;
        let is_last_step = step == total_steps - 1 || (stop_when_concluded && sim.is_concluded());

        // Only log at intervals or when a snapshot is being taken
        if should_print_status || is_record_step || is_last_step {
            info!(
                "Round [{}/{}] | S: {} | I: {} | R: {} | Deaths (est.): {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                step + 1,
                total_steps,
                counts.susceptible,
                counts.infected,
                counts.recovered,
                counts.estimated_deaths(sim.params().death_ratio),
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;

            // --- Record Snapshot ---
            if is_record_step || is_last_step {
                sim.record_snapshot();
            }
        } else {
            // For other steps, just log at trace level for detailed debugging if needed
            trace!(
                "Round [{}/{}] completed in {:.2} ms",
                step + 1,
                total_steps,
                step_duration.as_secs_f64() * 1000.0
            );
        }

        if stop_when_concluded && sim.is_concluded() {
            info!("Epidemic concluded after {} rounds: no infectious occupants remain.", sim.round());
            break;
        }
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished in {:.3} seconds ({} rounds).",
        total_duration.as_secs_f64(),
        sim.round()
    );

    // --- Save Recorded Data ---
    info!("Saving recorded data...");
    if sim.config().output.save_snapshots {
        let output_format = sim.config().output.format.as_deref().unwrap_or("json");
        let base_filename = sim.config().output.base_filename.clone();
        let snapshots = sim.recorded_snapshots();

        match output_format {
            "json" => {
                let filename = format!("{}_snapshots.json", base_filename);
                match File::create(&filename) {
                    Ok(mut file) => match serde_json::to_string(snapshots) {
                        Ok(json_string) => {
                            if let Err(e) = file.write_all(json_string.as_bytes()) {
                                error!("Error writing snapshot JSON to file '{}': {}", filename, e);
                            } else {
                                info!("All snapshots saved to {}", filename);
                            }
                        }
                        Err(e) => error!("Error serializing snapshots to JSON: {}", e),
                    },
                    Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
                }
            }
            "bincode" => {
                // Binary format (much more compact)
                let filename = format!("{}_snapshots.bin", base_filename);
                match File::create(&filename) {
                    Ok(file) => match bincode::serialize_into(file, snapshots) {
                        Ok(_) => {
                            info!("All snapshots saved to {} (binary format)", filename);
                        }
                        Err(e) => error!("Error serializing snapshots to bincode: {}", e),
                    },
                    Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
                }
            }
            "messagepack" => {
                // MessagePack format (compact and cross-platform)
                let filename = format!("{}_snapshots.msgpack", base_filename);
                match &mut File::create(&filename) {
                    Ok(file) => match rmp_serde::encode::write(file, snapshots) {
                        Ok(_) => {
                            info!("All snapshots saved to {} (MessagePack format)", filename);
                        }
                        Err(e) => error!("Error serializing snapshots to MessagePack: {}", e),
                    },
                    Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
                }
            }
            other => {
                error!("Unknown output format: {}. Using JSON instead.", other);
                let filename = format!("{}_snapshots.json", base_filename);
                match File::create(&filename) {
                    Ok(mut file) => match serde_json::to_string(snapshots) {
                        Ok(json_string) => {
                            if let Err(e) = file.write_all(json_string.as_bytes()) {
                                error!("Error writing snapshot JSON to file '{}': {}", filename, e);
                            } else {
                                info!("All snapshots saved to {}", filename);
                            }
                        }
                        Err(e) => error!("Error serializing snapshots to JSON: {}", e),
                    },
                    Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
                }
            }
        }
    } else {
        info!("Skipping saving snapshots as per config (save_snapshots is false).");
    }

    // Save the sampled history series if requested (separate from full snapshots)
    if sim.config().output.save_history {
        let filename = format!("{}_history.csv", sim.config().output.base_filename);
        let tracker = sim.stats();
        let death_ratio = sim.params().death_ratio;

        match csv::Writer::from_path(&filename) {
            Ok(mut writer) => {
                writer.write_record(["round", "susceptible", "infected", "recovered", "estimated_deaths"])?;
                for (i, round) in tracker.round_labels().iter().enumerate() {
                    let recovered = tracker.recovered_history()[i];
                    let deaths = (recovered as f64 * death_ratio).floor() as u64;
                    writer.write_record(&[
                        round.to_string(),
                        tracker.susceptible_history()[i].to_string(),
                        tracker.infected_history()[i].to_string(),
                        recovered.to_string(),
                        deaths.to_string(),
                    ])?;
                }
                writer.flush()?;
                info!("History series saved to {}", filename);
            }
            Err(e) => error!("Error saving CSV file '{}': {}", filename, e),
        }
    } else {
        info!("Skipping saving history series as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}
