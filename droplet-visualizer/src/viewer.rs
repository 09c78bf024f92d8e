use crate::plotter::{FramePlotter, RenderedFrame};
use anyhow::Result;
use eframe::egui;
use log::error;

/// Interactive frame navigation window. Owns the plotter; the buttons drive
/// the cursor and every navigation triggers a full re-render.
struct ViewerApp {
    plotter: FramePlotter,
    frame: RenderedFrame,
    texture: Option<egui::TextureHandle>,
    dirty: bool,
}

impl ViewerApp {
    fn show_frame(&mut self, frame: RenderedFrame) {
        self.frame = frame;
        self.dirty = true;
    }
}

/// Opens the viewer window, blocking until the user closes it.
pub fn run(plotter: FramePlotter) -> Result<()> {
    let frame = plotter.render_current()?;
    let window_title = format!("Droplet Visualizer - {}", plotter.name());
    let app = ViewerApp {
        plotter,
        frame,
        texture: None,
        dirty: true,
    };

    eframe::run_native(
        &window_title,
        eframe::NativeOptions::default(),
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("viewer window failed: {e}"))
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::bottom("navigation").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Prev").clicked() {
                    match self.plotter.prev_frame() {
                        Ok(frame) => self.show_frame(frame),
                        Err(e) => error!("Failed to render previous frame: {e:#}"),
                    }
                }
                if ui.button("Next").clicked() {
                    match self.plotter.next_frame() {
                        Ok(frame) => self.show_frame(frame),
                        Err(e) => error!("Failed to render next frame: {e:#}"),
                    }
                }
                ui.label(format!(
                    "{} / {}",
                    self.plotter.cursor() + 1,
                    self.plotter.frame_count()
                ));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(&self.frame.title);

            if self.dirty || self.texture.is_none() {
                let size = [
                    self.frame.image.width() as usize,
                    self.frame.image.height() as usize,
                ];
                let pixels = egui::ColorImage::from_rgba_unmultiplied(size, self.frame.image.as_raw());
                self.texture = Some(ctx.load_texture("frame", pixels, egui::TextureOptions::NEAREST));
                self.dirty = false;
            }
            if let Some(texture) = &self.texture {
                ui.image((texture.id(), texture.size_vec2()));
            }
        });
    }
}
