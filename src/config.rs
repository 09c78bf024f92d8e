use anyhow::Result;
use droplet_common::{Metadata, PointSet};
use serde::Deserialize;
use std::path::Path;

// Screen dimensions the simulation runs in (world units == pixels).
#[derive(Deserialize, Debug, Clone)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
}

// Run length and recording cadence.
#[derive(Deserialize, Debug, Clone)]
pub struct TimingConfig {
    pub number_of_frames: u32,
    pub number_of_recordings: u32,
}

// Parameters for the primary droplet population.
#[derive(Deserialize, Debug, Clone)]
pub struct DropletConfig {
    pub count: u32,
    pub radius: f32,
    #[serde(default = "default_true")]
    pub random_movement: bool,
    #[serde(default = "default_true")]
    pub intrinsic_movement: bool,
    #[serde(default = "default_max_velocity")]
    pub max_random_velocity: f32,
    #[serde(default = "default_max_velocity")]
    pub max_intrinsic_velocity: f32,
    #[serde(default)]
    pub disappearing: bool,
    #[serde(default = "default_disappear_probability")]
    pub disappear_probability: f32,
}

// The single larger droplet the small droplets avoid.
#[derive(Deserialize, Debug, Clone)]
pub struct LargerDropletConfig {
    pub enabled: bool,
    #[serde(default = "default_point_radius")]
    pub radius: f32,
    #[serde(default)]
    pub speed_x: f32,
    #[serde(default)]
    pub speed_y: f32,
}

impl Default for LargerDropletConfig {
    fn default() -> Self {
        LargerDropletConfig {
            enabled: false,
            radius: default_point_radius(),
            speed_x: 0.0,
            speed_y: 0.0,
        }
    }
}

// A field of focal points pulling droplets in (attraction) or pushing them
// away (repulsion). Both sections share this shape.
#[derive(Deserialize, Debug, Clone)]
pub struct PointFieldConfig {
    pub enabled: bool,
    #[serde(default)]
    pub movement: bool,
    #[serde(default = "default_point_count")]
    pub count: u32,
    #[serde(default = "default_point_radius")]
    pub radius: f32,
    #[serde(default = "default_point_strength")]
    pub strength: f32,
    #[serde(default = "default_point_speed")]
    pub speed: f32,
}

impl Default for PointFieldConfig {
    fn default() -> Self {
        PointFieldConfig {
            enabled: false,
            movement: false,
            count: default_point_count(),
            radius: default_point_radius(),
            strength: default_point_strength(),
            speed: default_point_speed(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: String,
    #[serde(default)]
    pub seed: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: default_output_directory(),
            seed: 0,
        }
    }
}

// Main generator configuration, loaded from config.toml.
#[derive(Deserialize, Debug, Clone)]
pub struct GeneratorConfig {
    pub screen: ScreenConfig,
    pub timing: TimingConfig,
    pub droplets: DropletConfig,
    #[serde(default)]
    pub larger_droplet: LargerDropletConfig,
    #[serde(default)]
    pub attraction: PointFieldConfig,
    #[serde(default)]
    pub repulsion: PointFieldConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl GeneratorConfig {
    /// Loads the generator configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file '{}': {}", path.display(), e))?;
        let config: GeneratorConfig = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("failed to parse TOML from '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.screen.width == 0 || self.screen.height == 0 {
            anyhow::bail!("screen dimensions must be positive");
        }
        if self.droplets.count == 0 {
            anyhow::bail!("droplets.count must be greater than 0");
        }
        if self.droplets.radius <= 0.0 {
            anyhow::bail!("droplets.radius must be positive");
        }
        if self.droplets.radius * 2.0 >= self.screen.width as f32
            || self.droplets.radius * 2.0 >= self.screen.height as f32
        {
            anyhow::bail!("droplet diameter does not fit on the screen");
        }
        if self.timing.number_of_frames == 0 {
            anyhow::bail!("timing.number_of_frames must be greater than 0");
        }
        if self.timing.number_of_recordings == 0
            || self.timing.number_of_recordings > self.timing.number_of_frames
        {
            anyhow::bail!(
                "timing.number_of_recordings must be between 1 and number_of_frames ({})",
                self.timing.number_of_frames
            );
        }
        if self.droplets.max_random_velocity < 0.0 {
            anyhow::bail!("droplets.max_random_velocity must not be negative");
        }
        if self.droplets.max_intrinsic_velocity < 0.0 {
            anyhow::bail!("droplets.max_intrinsic_velocity must not be negative");
        }
        if !(0.0..=1.0).contains(&self.droplets.disappear_probability) {
            anyhow::bail!("droplets.disappear_probability must be within [0, 1]");
        }
        for (name, field) in [("attraction", &self.attraction), ("repulsion", &self.repulsion)] {
            if field.enabled {
                if field.count == 0 {
                    anyhow::bail!("{name}.count must be greater than 0 when enabled");
                }
                if field.radius <= 0.0 {
                    anyhow::bail!("{name}.radius must be positive");
                }
                if field.radius * 2.0 >= self.screen.width as f32
                    || field.radius * 2.0 >= self.screen.height as f32
                {
                    anyhow::bail!("{name} radius does not fit on the screen");
                }
            }
        }
        if self.larger_droplet.enabled && self.larger_droplet.radius <= 0.0 {
            anyhow::bail!("larger_droplet.radius must be positive when enabled");
        }
        Ok(())
    }

    /// Steps between recorded frames.
    pub fn recording_interval(&self) -> u32 {
        (self.timing.number_of_frames / self.timing.number_of_recordings).max(1)
    }

    /// Metadata describing this run, as written next to the location data.
    pub fn metadata(&self) -> Metadata {
        Metadata {
            droplet_radius: self.droplets.radius,
            num_droplets: self.droplets.count,
            screen_width: self.screen.width,
            screen_height: self.screen.height,
            larger_droplet: self
                .larger_droplet
                .enabled
                .then_some(self.larger_droplet.radius),
            attraction: self.attraction.enabled.then_some(PointSet {
                count: self.attraction.count,
                radius: self.attraction.radius,
            }),
            repulsion: self.repulsion.enabled.then_some(PointSet {
                count: self.repulsion.count,
                radius: self.repulsion.radius,
            }),
        }
    }

    /// Shared suffix of the output file pair, e.g. `L1_A1_R0_1000_10`.
    pub fn base_filename(&self) -> String {
        format!(
            "L{}_A{}_R{}_{}_{}",
            self.larger_droplet.enabled as u8,
            self.attraction.enabled as u8,
            self.repulsion.enabled as u8,
            self.timing.number_of_frames,
            self.timing.number_of_recordings
        )
    }
}

fn default_true() -> bool {
    true
}

fn default_max_velocity() -> f32 {
    0.1
}

fn default_disappear_probability() -> f32 {
    0.01
}

fn default_point_count() -> u32 {
    10
}

fn default_point_radius() -> f32 {
    80.0
}

fn default_point_strength() -> f32 {
    0.2
}

fn default_point_speed() -> f32 {
    1.0
}

fn default_output_directory() -> String {
    "data".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[screen]
width = 1920
height = 1080

[timing]
number_of_frames = 1000
number_of_recordings = 10

[droplets]
count = 900
radius = 11.0

[larger_droplet]
enabled = true
radius = 80.0
speed_x = 0.2
speed_y = 0.01

[attraction]
enabled = true
movement = true
count = 15
radius = 80.0

[output]
directory = "data"
seed = 42
"#;

    #[test]
    fn parses_full_config() {
        let config: GeneratorConfig = toml::from_str(FULL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.droplets.count, 900);
        assert!(config.droplets.random_movement); // default
        assert_eq!(config.attraction.strength, 0.2); // default
        assert!(!config.repulsion.enabled); // section omitted entirely
        assert_eq!(config.recording_interval(), 100);
        assert_eq!(config.base_filename(), "L1_A1_R0_1000_10");
    }

    #[test]
    fn metadata_reflects_enabled_sections() {
        let config: GeneratorConfig = toml::from_str(FULL).unwrap();
        let meta = config.metadata();
        assert_eq!(meta.num_droplets, 900);
        assert_eq!(meta.larger_droplet, Some(80.0));
        assert_eq!(meta.attraction.unwrap().count, 15);
        assert!(meta.repulsion.is_none());
    }

    #[test]
    fn rejects_zero_recordings() {
        let mut config: GeneratorConfig = toml::from_str(FULL).unwrap();
        config.timing.number_of_recordings = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_velocities() {
        let mut config: GeneratorConfig = toml::from_str(FULL).unwrap();
        config.droplets.max_random_velocity = -0.1;
        assert!(config.validate().is_err());

        let mut config: GeneratorConfig = toml::from_str(FULL).unwrap();
        config.droplets.max_intrinsic_velocity = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_droplets() {
        let mut config: GeneratorConfig = toml::from_str(FULL).unwrap();
        config.droplets.radius = 2000.0;
        assert!(config.validate().is_err());
    }
}
