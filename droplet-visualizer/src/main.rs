use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::path::PathBuf;

mod plotter;
mod viewer;

use plotter::FramePlotter;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Location data file (.csv)
    #[arg(short, long)]
    location: PathBuf,

    /// Metadata file (.csv)
    #[arg(short, long)]
    metadata: PathBuf,

    /// Export every frame as a PNG under <DIR>/plots/<name>/ instead of
    /// opening the interactive viewer
    #[arg(long, value_name = "DIR")]
    save_all: Option<PathBuf>,

    /// Canvas scale factor relative to the recorded screen size
    #[arg(long, default_value_t = 1.0)]
    scale: f32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .init();

    info!("Starting Droplet Visualizer...");
    info!("Location file: {}", args.location.display());
    info!("Metadata file: {}", args.metadata.display());

    let mut plotter = FramePlotter::from_files(&args.location, &args.metadata, args.scale)?;
    info!(
        "Loaded {} frames for simulation '{}'.",
        plotter.frame_count(),
        plotter.name()
    );

    match args.save_all {
        Some(out_dir) => {
            let target = plotter.save_all(&out_dir)?;
            info!(
                "Saved {} frames to {}.",
                plotter.frame_count(),
                target.display()
            );
        }
        None => viewer::run(plotter)?,
    }

    Ok(())
}
