use anyhow::Result;
use log::{info, warn};
use std::time::Instant;

// Define modules used by main
mod config;
mod recorder;
mod simulation;
mod vecmath;

use config::GeneratorConfig;
use recorder::FrameRecorder;
use simulation::DropletSimulation;

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Droplet Data Generator...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = GeneratorConfig::load(&config_path)?;
    info!("Loaded configuration from {}.", config_path);

    let total_frames = config.timing.number_of_frames;
    let interval = config.recording_interval();
    info!(
        "Simulating {} frames, recording every {} frames ({} recordings).",
        total_frames,
        interval,
        config.timing.number_of_recordings
    );

    // --- Initialize Simulation ---
    let mut sim = DropletSimulation::new(config.clone())?;
    let mut recorder = FrameRecorder::new(&config);
    info!(
        "Initialized {} droplets on a {}x{} screen.",
        sim.live_droplet_count(),
        config.screen.width,
        config.screen.height
    );

    // --- Simulation Loop ---
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    for frame in 0..total_frames {
        if sim.is_exhausted() {
            warn!("All droplets disappeared after {} frames; stopping early.", frame);
            break;
        }

        sim.step();

        let is_record_frame = frame % interval == 0;
        if is_record_frame {
            recorder.record(frame, &sim);
        }

        // Print status periodically or when a frame is recorded.
        let now = Instant::now();
        let should_print_status = now.duration_since(previous_print_time).as_secs_f64() >= 5.0;
        if should_print_status || is_record_frame {
            info!(
                "Frame [{}/{}] | Droplets: {} | Recorded: {} | Elapsed: {:.2} s",
                frame + 1,
                total_frames,
                sim.live_droplet_count(),
                recorder.frame_count(),
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = now;
        }
    }

    info!(
        "Simulation finished in {:.3} seconds.",
        start_time.elapsed().as_secs_f64()
    );

    // --- Save Recorded Data ---
    let (location_path, metadata_path) = recorder.write(&config)?;
    info!("Location data saved to {}.", location_path.display());
    info!("Metadata saved to {}.", metadata_path.display());
    info!("Generation complete.");

    Ok(())
}
