use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// The metadata file exactly as stored on disk: a header row followed by a
/// single data row. The `larger_droplet` column is a 0/1 flag; the
/// `attraction_points` / `repulsion_points` columns are counts that double as
/// presence flags. Each optional category's radius column is only required
/// when that category is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub droplet_radius: f32,
    pub larger_droplet: u8,
    #[serde(default)]
    pub larger_droplet_radius: Option<f32>,
    pub attraction_points: u32,
    #[serde(default)]
    pub attraction_radius: Option<f32>,
    pub repulsion_points: u32,
    #[serde(default)]
    pub repulsion_radius: Option<f32>,
    pub num_droplets: u32,
    pub screen_width: u32,
    pub screen_height: u32,
}

/// Count and render radius for an optional point category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSet {
    pub count: u32,
    pub radius: f32,
}

/// Validated per-run configuration values. Optional categories are carried as
/// tagged variants rather than the flag/field pairs of the raw record, so a
/// category is either fully described or absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub droplet_radius: f32,
    pub num_droplets: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    /// Render radius of the larger droplet, when one was simulated.
    pub larger_droplet: Option<f32>,
    pub attraction: Option<PointSet>,
    pub repulsion: Option<PointSet>,
}

impl Metadata {
    /// Loads and validates the metadata file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open metadata file '{}'", path.display()))?;
        Self::from_reader(reader)
            .with_context(|| format!("failed to parse metadata file '{}'", path.display()))
    }

    /// Parses the single-row metadata CSV from any reader.
    pub fn from_reader<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let record: MetadataRecord = reader
            .deserialize()
            .next()
            .ok_or_else(|| anyhow!("metadata has no data row"))?
            .context("malformed metadata row")?;
        Self::from_record(&record)
    }

    /// Validates a raw record and folds the flag/field pairs into tagged
    /// variants. Fails fast on missing or inconsistent values.
    pub fn from_record(record: &MetadataRecord) -> Result<Self> {
        if record.droplet_radius <= 0.0 {
            anyhow::bail!("droplet_radius must be positive");
        }
        if record.num_droplets == 0 {
            anyhow::bail!("num_droplets must be greater than 0");
        }
        if record.screen_width == 0 || record.screen_height == 0 {
            anyhow::bail!("screen dimensions must be positive");
        }

        let larger_droplet = if record.larger_droplet != 0 {
            let radius = record
                .larger_droplet_radius
                .ok_or_else(|| anyhow!("larger_droplet is set but larger_droplet_radius is missing"))?;
            if radius <= 0.0 {
                anyhow::bail!("larger_droplet_radius must be positive");
            }
            Some(radius)
        } else {
            None
        };

        let attraction = point_set(
            record.attraction_points,
            record.attraction_radius,
            "attraction",
        )?;
        let repulsion = point_set(
            record.repulsion_points,
            record.repulsion_radius,
            "repulsion",
        )?;

        Ok(Metadata {
            droplet_radius: record.droplet_radius,
            num_droplets: record.num_droplets,
            screen_width: record.screen_width,
            screen_height: record.screen_height,
            larger_droplet,
            attraction,
            repulsion,
        })
    }

    /// Expands back into the on-disk record layout.
    pub fn to_record(&self) -> MetadataRecord {
        MetadataRecord {
            droplet_radius: self.droplet_radius,
            larger_droplet: self.larger_droplet.is_some() as u8,
            larger_droplet_radius: self.larger_droplet,
            attraction_points: self.attraction.map_or(0, |p| p.count),
            attraction_radius: self.attraction.map(|p| p.radius),
            repulsion_points: self.repulsion.map_or(0, |p| p.count),
            repulsion_radius: self.repulsion.map(|p| p.radius),
            num_droplets: self.num_droplets,
            screen_width: self.screen_width,
            screen_height: self.screen_height,
        }
    }

    /// Writes the metadata file (header row + one data row).
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create metadata file '{}'", path.display()))?;
        writer
            .serialize(self.to_record())
            .with_context(|| format!("failed to write metadata row to '{}'", path.display()))?;
        writer.flush()?;
        Ok(())
    }
}

fn point_set(count: u32, radius: Option<f32>, name: &str) -> Result<Option<PointSet>> {
    if count == 0 {
        return Ok(None);
    }
    let radius =
        radius.ok_or_else(|| anyhow!("{name}_points is set but {name}_radius is missing"))?;
    if radius <= 0.0 {
        anyhow::bail!("{name}_radius must be positive");
    }
    Ok(Some(PointSet { count, radius }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_ROW: &str = "\
droplet_radius,larger_droplet,larger_droplet_radius,attraction_points,attraction_radius,repulsion_points,repulsion_radius,num_droplets,screen_width,screen_height
11,1,80,15,80,0,,900,1920,1080
";

    fn parse(data: &str) -> Result<Metadata> {
        Metadata::from_reader(csv::Reader::from_reader(data.as_bytes()))
    }

    #[test]
    fn parses_full_row() {
        let meta = parse(FULL_ROW).unwrap();
        assert_eq!(meta.droplet_radius, 11.0);
        assert_eq!(meta.num_droplets, 900);
        assert_eq!(meta.screen_width, 1920);
        assert_eq!(meta.screen_height, 1080);
        assert_eq!(meta.larger_droplet, Some(80.0));
        assert_eq!(
            meta.attraction,
            Some(PointSet {
                count: 15,
                radius: 80.0
            })
        );
        assert_eq!(meta.repulsion, None);
    }

    #[test]
    fn flag_without_radius_is_an_error() {
        let data = "\
droplet_radius,larger_droplet,larger_droplet_radius,attraction_points,attraction_radius,repulsion_points,repulsion_radius,num_droplets,screen_width,screen_height
11,1,,0,,0,,900,1920,1080
";
        let err = parse(data).unwrap_err();
        assert!(err.to_string().contains("larger_droplet_radius"));
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let data = "\
droplet_radius,larger_droplet,num_droplets,screen_width
11,0,900,1920
";
        assert!(parse(data).is_err());
    }

    #[test]
    fn zero_droplets_is_an_error() {
        let data = "\
droplet_radius,larger_droplet,larger_droplet_radius,attraction_points,attraction_radius,repulsion_points,repulsion_radius,num_droplets,screen_width,screen_height
11,0,,0,,0,,0,1920,1080
";
        let err = parse(data).unwrap_err();
        assert!(err.to_string().contains("num_droplets"));
    }

    #[test]
    fn write_then_load_round_trips() {
        let meta = Metadata {
            droplet_radius: 7.5,
            num_droplets: 4,
            screen_width: 640,
            screen_height: 480,
            larger_droplet: None,
            attraction: Some(PointSet {
                count: 2,
                radius: 40.0,
            }),
            repulsion: Some(PointSet {
                count: 3,
                radius: 25.0,
            }),
        };

        let dir = std::env::temp_dir().join("droplet_common_metadata_roundtrip");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("meta_data.csv");
        meta.write(&path).unwrap();

        let loaded = Metadata::load(&path).unwrap();
        assert_eq!(loaded, meta);
    }
}
