use anyhow::{Context, Result};
use droplet_common::{Category, CategoryTable, FrameTable, Metadata};
use image::{ImageBuffer, Pixel, Rgba, RgbaImage};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Fill/edge colors and opacity for one plotted category.
struct CircleStyle {
    fill: [u8; 3],
    edge: [u8; 3],
    alpha: f32,
}

fn category_style(category: Category) -> CircleStyle {
    match category {
        // Light blue fill with a dark blue edge.
        Category::Droplet => CircleStyle {
            fill: [173, 216, 230],
            edge: [0, 0, 139],
            alpha: 0.7,
        },
        Category::LargerDroplet => CircleStyle {
            fill: [0, 0, 0],
            edge: [0, 0, 0],
            alpha: 0.4,
        },
        Category::Attraction => CircleStyle {
            fill: [0, 128, 0],
            edge: [0, 128, 0],
            alpha: 0.1,
        },
        Category::Repulsion => CircleStyle {
            fill: [255, 0, 0],
            edge: [255, 0, 0],
            alpha: 0.1,
        },
    }
}

/// One fully rendered frame, ready for display or export.
pub struct RenderedFrame {
    /// Cursor position this frame was rendered from.
    pub index: usize,
    /// Recorded frame label (the generator's step counter).
    pub label: u32,
    /// Live droplets in this frame.
    pub entity_count: usize,
    pub title: String,
    pub image: RgbaImage,
}

/// Owns a loaded dataset, a cursor over its frames, and the per-frame
/// renderer. Rendering is a read-only projection of the dataset; only the
/// cursor mutates after construction.
pub struct FramePlotter {
    metadata: Metadata,
    frames: FrameTable,
    name: String,
    scale: f32,
    cursor: usize,
}

impl FramePlotter {
    /// Loads the location/metadata file pair and cross-validates their
    /// shapes. Fails fast on any inconsistency.
    pub fn from_files(location: &Path, metadata: &Path, scale: f32) -> Result<Self> {
        if !(scale > 0.0) {
            anyhow::bail!("scale must be positive");
        }
        let metadata = Metadata::load(metadata)?;
        let frames = FrameTable::read(location)?;
        frames
            .validate_against(&metadata)
            .with_context(|| format!("location file '{}' does not match metadata", location.display()))?;

        Ok(FramePlotter {
            metadata,
            frames,
            name: simulation_name(location),
            scale,
            cursor: 0,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.frame_count()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Simulation name derived from the location file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Live droplets in one frame: coordinate pairs not marked with the
    /// sentinel value.
    pub fn entity_count(&self, frame: usize) -> usize {
        self.frames.droplets().live_pairs(frame)
    }

    pub fn title(&self, frame: usize) -> String {
        format!(
            "Frame : {} | Num Droplets : {}",
            self.frames.label(frame).unwrap_or_default(),
            self.entity_count(frame)
        )
    }

    /// Renders one frame onto a fresh canvas: every category present in the
    /// dataset as alpha-composited circles, drawn in dataset order so later
    /// categories sit on top. The y axis is flipped so the simulation origin
    /// is bottom-left.
    pub fn render(&self, frame: usize) -> Result<RenderedFrame> {
        if frame >= self.frame_count() {
            anyhow::bail!(
                "frame index {} out of range (dataset has {} frames)",
                frame,
                self.frame_count()
            );
        }

        let width = (self.metadata.screen_width as f32 * self.scale).round() as u32;
        let height = (self.metadata.screen_height as f32 * self.scale).round() as u32;
        let mut image = ImageBuffer::from_pixel(width, height, BACKGROUND);

        for category in Category::ALL {
            if let Some(table) = self.frames.category(category) {
                if let Some(radius) = self.category_radius(category) {
                    self.draw_category(&mut image, table, frame, radius, category);
                }
            }
        }

        Ok(RenderedFrame {
            index: frame,
            label: self.frames.label(frame).unwrap_or_default(),
            entity_count: self.entity_count(frame),
            title: self.title(frame),
            image,
        })
    }

    /// Renders the frame the cursor currently points at.
    pub fn render_current(&self) -> Result<RenderedFrame> {
        self.render(self.cursor)
    }

    /// Advances the cursor (wrapping past the last frame) and renders.
    pub fn next_frame(&mut self) -> Result<RenderedFrame> {
        self.cursor = (self.cursor + 1) % self.frame_count();
        self.render_current()
    }

    /// Retreats the cursor (wrapping below zero) and renders.
    pub fn prev_frame(&mut self) -> Result<RenderedFrame> {
        self.cursor = if self.cursor == 0 {
            self.frame_count() - 1
        } else {
            self.cursor - 1
        };
        self.render_current()
    }

    /// Exports every frame in order as `T<frame>.png` under
    /// `<out_dir>/plots/<name>/`, creating the path if absent. The first
    /// failed write aborts the batch. Returns the target directory.
    pub fn save_all(&mut self, out_dir: &Path) -> Result<PathBuf> {
        let target = out_dir.join("plots").join(&self.name);
        fs::create_dir_all(&target)
            .with_context(|| format!("failed to create output directory '{}'", target.display()))?;

        let progress = ProgressBar::new(self.frame_count() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );

        for index in 0..self.frame_count() {
            self.cursor = index;
            let frame = self.render(index)?;
            let path = target.join(format!("T{index}.png"));
            frame
                .image
                .save(&path)
                .with_context(|| format!("failed to write frame image '{}'", path.display()))?;
            progress.inc(1);
        }
        progress.finish_with_message(format!("Saved {} frames", self.frame_count()));

        info!(
            "Exported {} frames to {}",
            self.frame_count(),
            target.display()
        );
        Ok(target)
    }

    fn category_radius(&self, category: Category) -> Option<f32> {
        match category {
            Category::Droplet => Some(self.metadata.droplet_radius),
            Category::LargerDroplet => self.metadata.larger_droplet,
            Category::Attraction => self.metadata.attraction.map(|p| p.radius),
            Category::Repulsion => self.metadata.repulsion.map(|p| p.radius),
        }
    }

    fn draw_category(
        &self,
        image: &mut RgbaImage,
        table: &CategoryTable,
        frame: usize,
        radius: f32,
        category: Category,
    ) {
        let style = category_style(category);
        let height = image.height() as f32;
        for (x, y) in table.positions(frame) {
            let cx = x * self.scale;
            let cy = height - y * self.scale; // simulation origin is bottom-left
            draw_circle_blend(image, cx, cy, radius * self.scale, &style);
        }
    }
}

/// Rasterizes a filled circle with a one-pixel edge ring, alpha-compositing
/// every covered pixel over the existing canvas.
fn draw_circle_blend(image: &mut RgbaImage, cx: f32, cy: f32, radius: f32, style: &CircleStyle) {
    let radius = radius.max(0.5);
    let alpha = (style.alpha * 255.0).round() as u8;
    let inner = (radius - 1.0).max(0.0);

    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = ((cx + radius).ceil() as i64).clamp(0, image.width() as i64) as u32;
    let y1 = ((cy + radius).ceil() as i64).clamp(0, image.height() as i64) as u32;

    for py in y0..y1 {
        for px in x0..x1 {
            let dx = px as f32 + 0.5 - cx;
            let dy = py as f32 + 0.5 - cy;
            let dist_sq = dx * dx + dy * dy;
            if dist_sq <= radius * radius {
                let color = if dist_sq > inner * inner {
                    style.edge
                } else {
                    style.fill
                };
                image
                    .get_pixel_mut(px, py)
                    .blend(&Rgba([color[0], color[1], color[2], alpha]));
            }
        }
    }
}

/// Derives the simulation name from the location file name: start one
/// character before the first ASCII digit (dropping the leading prefix) and
/// strip the extension. Without any digit the whole stem is the name.
fn simulation_name(location: &Path) -> String {
    let file_name = location
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match file_name.rfind('.') {
        Some(dot) => &file_name[..dot],
        None => &file_name[..],
    };
    match stem.find(|c: char| c.is_ascii_digit()) {
        Some(position) => {
            // Step back one character, not one byte: the prefix may end in a
            // multi-byte character.
            let start = stem[..position]
                .char_indices()
                .last()
                .map_or(0, |(index, _)| index);
            stem[start..].to_string()
        }
        None => stem.to_string(),
    }
}
