use crate::config::GeneratorConfig;
use crate::simulation::{DropletSimulation, Mover};
use anyhow::{Context, Result};
use droplet_common::{CategoryTable, FrameTable, SENTINEL};
use log::info;
use std::fs;
use std::path::PathBuf;

/// Accumulates sampled positions frame by frame and turns them into the
/// location + metadata file pair the visualizer consumes.
///
/// Slot layout is fixed at construction: two coordinate rows per declared
/// droplet, so disappeared droplets leave sentinel pairs behind rather than
/// shrinking the table.
pub struct FrameRecorder {
    labels: Vec<u32>,
    droplet_slots: Vec<Vec<f32>>,
    larger_slots: Option<Vec<Vec<f32>>>,
    attraction_slots: Option<Vec<Vec<f32>>>,
    repulsion_slots: Option<Vec<Vec<f32>>>,
}

impl FrameRecorder {
    pub fn new(config: &GeneratorConfig) -> Self {
        let slots = |pairs: u32| vec![Vec::new(); pairs as usize * 2];
        FrameRecorder {
            labels: Vec::new(),
            droplet_slots: slots(config.droplets.count),
            larger_slots: config.larger_droplet.enabled.then(|| slots(1)),
            attraction_slots: config.attraction.enabled.then(|| slots(config.attraction.count)),
            repulsion_slots: config.repulsion.enabled.then(|| slots(config.repulsion.count)),
        }
    }

    /// Samples the current simulation state as one recorded frame.
    pub fn record(&mut self, label: u32, sim: &DropletSimulation) {
        self.labels.push(label);

        let live = sim.live_droplet_count();
        for (index, pair) in self.droplet_slots.chunks_exact_mut(2).enumerate() {
            let (x, y) = if index < live {
                let pos = sim.droplets()[index].pos;
                (pos.x, pos.y)
            } else {
                (SENTINEL, SENTINEL)
            };
            pair[0].push(x);
            pair[1].push(y);
        }

        if let Some(slots) = self.larger_slots.as_mut() {
            if let Some(giant) = sim.larger_droplet() {
                slots[0].push(giant.pos.x);
                slots[1].push(giant.pos.y);
            }
        }
        if let Some(slots) = self.attraction_slots.as_mut() {
            push_movers(slots, sim.attractions());
        }
        if let Some(slots) = self.repulsion_slots.as_mut() {
            push_movers(slots, sim.repulsions());
        }
    }

    pub fn frame_count(&self) -> usize {
        self.labels.len()
    }

    /// Assembles the recorded slots into a validated frame table.
    pub fn into_table(self) -> Result<FrameTable> {
        let block = |slots: Vec<Vec<f32>>| CategoryTable::from_slots(slots);
        FrameTable::new(
            self.labels,
            block(self.droplet_slots).context("recorded droplet block is malformed")?,
            self.larger_slots.map(block).transpose()?,
            self.attraction_slots.map(block).transpose()?,
            self.repulsion_slots.map(block).transpose()?,
        )
    }

    /// Writes the location and metadata CSV pair into the configured output
    /// directory, returning both paths.
    pub fn write(self, config: &GeneratorConfig) -> Result<(PathBuf, PathBuf)> {
        let dir = PathBuf::from(&config.output.directory);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;

        let base = config.base_filename();
        let location_path = dir.join(format!("loc_data_{base}.csv"));
        let metadata_path = dir.join(format!("meta_data_{base}.csv"));

        let table = self.into_table()?;
        table.write(&location_path)?;
        config.metadata().write(&metadata_path)?;

        info!(
            "Recorded {} frames to {}",
            table.frame_count(),
            location_path.display()
        );
        Ok((location_path, metadata_path))
    }
}

fn push_movers(slots: &mut [Vec<f32>], movers: &[Mover]) {
    for (pair, mover) in slots.chunks_exact_mut(2).zip(movers) {
        pair[0].push(mover.pos.x);
        pair[1].push(mover.pos.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::DropletSimulation;
    use droplet_common::{FrameTable, Metadata};

    fn test_config(dir: &str) -> GeneratorConfig {
        let text = format!(
            r#"
[screen]
width = 200
height = 160

[timing]
number_of_frames = 6
number_of_recordings = 3

[droplets]
count = 4
radius = 5.0

[larger_droplet]
enabled = true
radius = 20.0
speed_x = 0.2
speed_y = 0.1

[output]
directory = "{dir}"
seed = 3
"#
        );
        toml::from_str(&text).unwrap()
    }

    #[test]
    fn recorded_output_round_trips_through_the_readers() {
        let dir = std::env::temp_dir().join("droplet_engine_recorder_roundtrip");
        let config = test_config(&dir.display().to_string());

        let mut sim = DropletSimulation::new(config.clone()).unwrap();
        let mut recorder = FrameRecorder::new(&config);
        let interval = config.recording_interval();
        for frame in 0..config.timing.number_of_frames {
            sim.step();
            if frame % interval == 0 {
                recorder.record(frame, &sim);
            }
        }
        assert_eq!(recorder.frame_count(), 3);

        let (location_path, metadata_path) = recorder.write(&config).unwrap();
        let metadata = Metadata::load(&metadata_path).unwrap();
        let table = FrameTable::read(&location_path).unwrap();

        table.validate_against(&metadata).unwrap();
        assert_eq!(table.frame_count(), 3);
        assert_eq!(table.labels(), &[0, 2, 4]);
        assert_eq!(table.droplets().live_pairs(0), 4);
        assert_eq!(metadata.larger_droplet, Some(20.0));
    }

    #[test]
    fn disappeared_droplets_become_sentinel_pairs() {
        let dir = std::env::temp_dir().join("droplet_engine_recorder_sentinel");
        let mut config = test_config(&dir.display().to_string());
        config.droplets.disappearing = true;
        config.droplets.disappear_probability = 1.0;

        let mut sim = DropletSimulation::new(config.clone()).unwrap();
        let mut recorder = FrameRecorder::new(&config);
        sim.step();
        recorder.record(0, &sim); // 3 live droplets of 4
        sim.step();
        recorder.record(1, &sim); // 2 live droplets

        let table = recorder.into_table().unwrap();
        assert_eq!(table.droplets().slot_count(), 8);
        assert_eq!(table.droplets().live_pairs(0), 3);
        assert_eq!(table.droplets().live_pairs(1), 2);
    }
}
