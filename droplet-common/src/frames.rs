use crate::metadata::Metadata;
use anyhow::{anyhow, Context, Result};
use std::io;
use std::path::Path;

/// Marks an absent entity slot: written into both coordinates of a pair.
pub const SENTINEL: f32 = -1.0;

/// A class of plotted entity. Each category has its own block of coordinate
/// columns in the location file, identified by a single-letter prefix on the
/// column label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Droplet,
    LargerDroplet,
    Attraction,
    Repulsion,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Droplet,
        Category::LargerDroplet,
        Category::Attraction,
        Category::Repulsion,
    ];

    pub fn from_prefix(prefix: char) -> Option<Category> {
        match prefix {
            'D' => Some(Category::Droplet),
            'L' => Some(Category::LargerDroplet),
            'A' => Some(Category::Attraction),
            'R' => Some(Category::Repulsion),
            _ => None,
        }
    }

    pub fn prefix(self) -> char {
        match self {
            Category::Droplet => 'D',
            Category::LargerDroplet => 'L',
            Category::Attraction => 'A',
            Category::Repulsion => 'R',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Droplet => "droplet",
            Category::LargerDroplet => "larger droplet",
            Category::Attraction => "attraction",
            Category::Repulsion => "repulsion",
        }
    }

    fn index(self) -> usize {
        match self {
            Category::Droplet => 0,
            Category::LargerDroplet => 1,
            Category::Attraction => 2,
            Category::Repulsion => 3,
        }
    }
}

/// Coordinate slots for one category across all recorded frames. Rows are
/// interleaved x,y slots, columns are frames, matching the in-memory model
/// of the visualizer: `slots[slot][frame]`.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    slots: Vec<Vec<f32>>,
}

impl CategoryTable {
    /// Builds a table from slot rows, rejecting empty, odd-sized, or ragged
    /// blocks.
    pub fn from_slots(slots: Vec<Vec<f32>>) -> Result<Self> {
        if slots.is_empty() {
            anyhow::bail!("coordinate block is empty");
        }
        if slots.len() % 2 != 0 {
            anyhow::bail!(
                "coordinate block has {} slots, which is not a multiple of 2",
                slots.len()
            );
        }
        let frames = slots[0].len();
        if slots.iter().any(|slot| slot.len() != frames) {
            anyhow::bail!("coordinate slots cover differing frame counts");
        }
        Ok(CategoryTable { slots })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn frame_count(&self) -> usize {
        self.slots[0].len()
    }

    /// All non-sentinel (x, y) pairs present in one frame.
    pub fn positions(&self, frame: usize) -> Vec<(f32, f32)> {
        if frame >= self.frame_count() {
            return Vec::new();
        }
        self.slots
            .chunks_exact(2)
            .filter_map(|pair| {
                let (x, y) = (pair[0][frame], pair[1][frame]);
                if x == SENTINEL && y == SENTINEL {
                    None
                } else {
                    Some((x, y))
                }
            })
            .collect()
    }

    /// Number of entities present in one frame.
    pub fn live_pairs(&self, frame: usize) -> usize {
        if frame >= self.frame_count() {
            return 0;
        }
        self.slots
            .chunks_exact(2)
            .filter(|pair| !(pair[0][frame] == SENTINEL && pair[1][frame] == SENTINEL))
            .count()
    }
}

/// The full location dataset: per-category coordinate tables sharing one
/// frame axis, plus the recorded frame labels. Droplets are always present;
/// the other categories are optional.
#[derive(Debug, Clone)]
pub struct FrameTable {
    labels: Vec<u32>,
    droplets: CategoryTable,
    larger_droplet: Option<CategoryTable>,
    attraction: Option<CategoryTable>,
    repulsion: Option<CategoryTable>,
}

impl FrameTable {
    /// Assembles a table from already-built category blocks, enforcing the
    /// shared-frame-axis invariant.
    pub fn new(
        labels: Vec<u32>,
        droplets: CategoryTable,
        larger_droplet: Option<CategoryTable>,
        attraction: Option<CategoryTable>,
        repulsion: Option<CategoryTable>,
    ) -> Result<Self> {
        if labels.is_empty() {
            anyhow::bail!("location table contains no frames");
        }
        let frames = labels.len();
        let tables = [
            Some(&droplets),
            larger_droplet.as_ref(),
            attraction.as_ref(),
            repulsion.as_ref(),
        ];
        for table in tables.into_iter().flatten() {
            if table.frame_count() != frames {
                anyhow::bail!(
                    "category covers {} frames but {} labels were recorded",
                    table.frame_count(),
                    frames
                );
            }
        }
        Ok(FrameTable {
            labels,
            droplets,
            larger_droplet,
            attraction,
            repulsion,
        })
    }

    /// Reads and validates a location file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open location file '{}'", path.display()))?;
        Self::from_reader(reader)
            .with_context(|| format!("failed to parse location file '{}'", path.display()))
    }

    /// Parses the location CSV from any reader. The header row carries the
    /// slot labels (frame column first); each data row is one recorded frame.
    /// The table is transposed on load into slot-rows x frame-columns.
    pub fn from_reader<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let headers = reader.headers().context("missing header row")?.clone();
        if headers.len() < 3 {
            anyhow::bail!("location header must contain a frame column and coordinate slots");
        }

        // Map each coordinate column to its category and slot index.
        let mut columns = Vec::with_capacity(headers.len() - 1);
        let mut blocks: [Vec<Vec<f32>>; 4] = [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
        for label in headers.iter().skip(1) {
            let prefix = label
                .chars()
                .next()
                .ok_or_else(|| anyhow!("empty column label in location header"))?;
            let category = Category::from_prefix(prefix).ok_or_else(|| {
                anyhow!("unknown category prefix '{prefix}' in column '{label}'")
            })?;
            let block = &mut blocks[category.index()];
            columns.push((category.index(), block.len()));
            block.push(Vec::new());
        }

        let mut labels = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("malformed location row {}", row + 1))?;
            let label: u32 = record
                .get(0)
                .unwrap_or("")
                .trim()
                .parse()
                .with_context(|| format!("bad frame label in location row {}", row + 1))?;
            labels.push(label);
            for (&(category, slot), field) in columns.iter().zip(record.iter().skip(1)) {
                let value: f32 = field.trim().parse().with_context(|| {
                    format!("bad coordinate '{}' in location row {}", field, row + 1)
                })?;
                blocks[category][slot].push(value);
            }
        }

        let [droplets, larger_droplet, attraction, repulsion] = blocks;
        if droplets.is_empty() {
            anyhow::bail!("location file contains no droplet columns");
        }
        let droplets = CategoryTable::from_slots(droplets)
            .with_context(|| format!("invalid {} block", Category::Droplet.label()))?;
        Self::new(
            labels,
            droplets,
            optional_block(larger_droplet, Category::LargerDroplet)?,
            optional_block(attraction, Category::Attraction)?,
            optional_block(repulsion, Category::Repulsion)?,
        )
    }

    /// Writes the location file in the on-disk layout (header of slot
    /// labels, one row per recorded frame).
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create location file '{}'", path.display()))?;

        let mut header = vec!["frame".to_string()];
        for (category, table) in self.present_tables() {
            for pair in 0..table.slot_count() / 2 {
                header.push(format!("{}{}x", category.prefix(), pair));
                header.push(format!("{}{}y", category.prefix(), pair));
            }
        }
        writer.write_record(&header)?;

        for (frame, label) in self.labels.iter().enumerate() {
            let mut row = vec![label.to_string()];
            for (_, table) in self.present_tables() {
                for slot in &table.slots {
                    row.push(slot[frame].to_string());
                }
            }
            writer.write_record(&row)?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to flush location file '{}'", path.display()))?;
        Ok(())
    }

    pub fn frame_count(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn label(&self, frame: usize) -> Option<u32> {
        self.labels.get(frame).copied()
    }

    pub fn droplets(&self) -> &CategoryTable {
        &self.droplets
    }

    pub fn category(&self, category: Category) -> Option<&CategoryTable> {
        match category {
            Category::Droplet => Some(&self.droplets),
            Category::LargerDroplet => self.larger_droplet.as_ref(),
            Category::Attraction => self.attraction.as_ref(),
            Category::Repulsion => self.repulsion.as_ref(),
        }
    }

    /// Cross-checks the table shape against the counts the metadata declares.
    pub fn validate_against(&self, metadata: &Metadata) -> Result<()> {
        let expected = metadata.num_droplets as usize * 2;
        if self.droplets.slot_count() != expected {
            anyhow::bail!(
                "location file has {} droplet coordinate slots but metadata declares {} droplets",
                self.droplets.slot_count(),
                metadata.num_droplets
            );
        }

        check_block(
            self.larger_droplet.as_ref(),
            metadata.larger_droplet.map(|_| 1),
            Category::LargerDroplet,
        )?;
        check_block(
            self.attraction.as_ref(),
            metadata.attraction.map(|p| p.count),
            Category::Attraction,
        )?;
        check_block(
            self.repulsion.as_ref(),
            metadata.repulsion.map(|p| p.count),
            Category::Repulsion,
        )?;
        Ok(())
    }

    fn present_tables(&self) -> Vec<(Category, &CategoryTable)> {
        Category::ALL
            .iter()
            .filter_map(|&category| self.category(category).map(|table| (category, table)))
            .collect()
    }
}

fn optional_block(slots: Vec<Vec<f32>>, category: Category) -> Result<Option<CategoryTable>> {
    if slots.is_empty() {
        return Ok(None);
    }
    CategoryTable::from_slots(slots)
        .map(Some)
        .with_context(|| format!("invalid {} block", category.label()))
}

fn check_block(
    table: Option<&CategoryTable>,
    declared_count: Option<u32>,
    category: Category,
) -> Result<()> {
    match (table, declared_count) {
        (Some(table), Some(count)) => {
            let expected = count as usize * 2;
            if table.slot_count() != expected {
                anyhow::bail!(
                    "{} block has {} coordinate slots but metadata declares {} entities",
                    category.label(),
                    table.slot_count(),
                    count
                );
            }
            Ok(())
        }
        (Some(_), None) => Err(anyhow!(
            "location file has a {} block but metadata does not declare one",
            category.label()
        )),
        (None, Some(_)) => Err(anyhow!(
            "metadata declares {} entities but the location file has no '{}' columns",
            category.label(),
            category.prefix()
        )),
        (None, None) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Metadata, PointSet};

    const LOCATION: &str = "\
frame,D0x,D0y,D1x,D1y,L0x,L0y
0,10,10,30,30,50,50
100,12,11,29,31,52,50
200,14,12,-1,-1,54,51
";

    fn parse(data: &str) -> Result<FrameTable> {
        FrameTable::from_reader(csv::Reader::from_reader(data.as_bytes()))
    }

    fn metadata(num_droplets: u32) -> Metadata {
        Metadata {
            droplet_radius: 5.0,
            num_droplets,
            screen_width: 100,
            screen_height: 80,
            larger_droplet: Some(10.0),
            attraction: None,
            repulsion: None,
        }
    }

    #[test]
    fn splits_categories_and_transposes() {
        let table = parse(LOCATION).unwrap();
        assert_eq!(table.frame_count(), 3);
        assert_eq!(table.labels(), &[0, 100, 200]);
        assert_eq!(table.droplets().slot_count(), 4);

        let larger = table.category(Category::LargerDroplet).unwrap();
        assert_eq!(larger.slot_count(), 2);
        assert_eq!(larger.positions(2), vec![(54.0, 51.0)]);

        assert!(table.category(Category::Attraction).is_none());
        assert!(table.category(Category::Repulsion).is_none());
    }

    #[test]
    fn sentinel_pairs_are_not_live() {
        let table = parse(LOCATION).unwrap();
        assert_eq!(table.droplets().live_pairs(0), 2);
        assert_eq!(table.droplets().live_pairs(1), 2);
        assert_eq!(table.droplets().live_pairs(2), 1);
        assert_eq!(table.droplets().positions(2), vec![(14.0, 12.0)]);
    }

    #[test]
    fn unknown_prefix_is_an_error() {
        let data = "\
frame,D0x,D0y,X0x,X0y
0,1,2,3,4
";
        let err = parse(data).unwrap_err();
        assert!(format!("{err:#}").contains("unknown category prefix"));
    }

    #[test]
    fn odd_slot_count_is_an_error() {
        let data = "\
frame,D0x,D0y,D1x
0,1,2,3
";
        let err = parse(data).unwrap_err();
        assert!(format!("{err:#}").contains("multiple of 2"));
    }

    #[test]
    fn ragged_row_is_an_error() {
        let data = "\
frame,D0x,D0y
0,1,2
1,3
";
        assert!(parse(data).is_err());
    }

    #[test]
    fn non_numeric_coordinate_is_an_error() {
        let data = "\
frame,D0x,D0y
0,1,oops
";
        let err = parse(data).unwrap_err();
        assert!(format!("{err:#}").contains("bad coordinate"));
    }

    #[test]
    fn empty_table_is_an_error() {
        let data = "frame,D0x,D0y\n";
        let err = parse(data).unwrap_err();
        assert!(format!("{err:#}").contains("no frames"));
    }

    #[test]
    fn validates_against_metadata() {
        let table = parse(LOCATION).unwrap();
        table.validate_against(&metadata(2)).unwrap();

        let err = table.validate_against(&metadata(3)).unwrap_err();
        assert!(err.to_string().contains("declares 3 droplets"));
    }

    #[test]
    fn missing_declared_block_is_an_error() {
        let table = parse(LOCATION).unwrap();
        let mut meta = metadata(2);
        meta.attraction = Some(PointSet {
            count: 1,
            radius: 20.0,
        });
        let err = table.validate_against(&meta).unwrap_err();
        assert!(err.to_string().contains("no 'A' columns"));
    }

    #[test]
    fn write_then_read_round_trips() {
        let table = parse(LOCATION).unwrap();
        let dir = std::env::temp_dir().join("droplet_common_frames_roundtrip");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("loc_data.csv");
        table.write(&path).unwrap();

        let reloaded = FrameTable::read(&path).unwrap();
        assert_eq!(reloaded.labels(), table.labels());
        assert_eq!(
            reloaded.droplets().positions(2),
            table.droplets().positions(2)
        );
        assert_eq!(reloaded.droplets().live_pairs(2), 1);
    }
}
