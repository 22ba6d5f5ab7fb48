use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::Receiver;
use egui::{ColorImage, TextureHandle, TextureOptions};
use winit::window::Window;

use crate::export::{self, ExportTask};
use crate::gpu::GpuContext;
use crate::input::{Dispatch, Dispatcher, InputEvent};
use crate::media::types::DecodedFrame;
use crate::player::PlaybackController;
use crate::player::observer::PlayerEvent;
use crate::player::scrub::ScrubBar;
use crate::settings::PlayerSettings;
use crate::ui::status_bar::{ExportState, StatusInfo};
use crate::ui::{self, EguiOverlay, PlayerView};

/// A running player, created before the window exists.
pub struct Session {
    pub player: PlaybackController,
    pub events: Receiver<PlayerEvent>,
    pub input: PathBuf,
    pub export_path: PathBuf,
    pub settings: PlayerSettings,
}

/// The reverse export started from the keyboard, at most one at a time.
#[derive(Default)]
pub struct ExportSlot {
    task: Option<ExportTask>,
    state: ExportState,
}

impl ExportSlot {
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn state(&self) -> &ExportState {
        &self.state
    }

    /// Start an export unless one is already running.
    /// Returns whether a new export was started.
    pub fn start<F>(&mut self, spawn: F) -> bool
    where
        F: FnOnce() -> std::io::Result<ExportTask>,
    {
        if self.task.is_some() {
            log::info!("Export already running, ignoring request");
            return false;
        }
        match spawn() {
            Ok(task) => {
                self.state = ExportState::Running {
                    file_name: display_name(task.output()),
                };
                self.task = Some(task);
                true
            }
            Err(e) => {
                log::error!("Failed to start export: {e}");
                self.state = ExportState::Failed(e.to_string());
                false
            }
        }
    }

    /// Check the running export. Returns true once, when it completes.
    pub fn poll(&mut self) -> bool {
        let Some(task) = self.task.as_mut() else {
            return false;
        };
        let Some(result) = task.poll() else {
            return false;
        };
        let file_name = display_name(task.output());
        self.task = None;
        self.state = match result {
            Ok(report) => ExportState::Done {
                file_name,
                written: report.written,
                skipped: report.skipped,
            },
            Err(e) => ExportState::Failed(e.to_string()),
        };
        true
    }

    pub fn cancel(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.cancel();
            log::info!("Export to {} cancelled", task.output().display());
        }
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub struct App {
    pub gpu: GpuContext,
    pub egui_overlay: EguiOverlay,
    pub window: Arc<Window>,
    pub quit_requested: bool,
    player: PlaybackController,
    events: Receiver<PlayerEvent>,
    scrub: ScrubBar,
    dispatcher: Dispatcher,
    texture: Option<TextureHandle>,
    input: PathBuf,
    export_path: PathBuf,
    export: ExportSlot,
    settings: PlayerSettings,
}

impl App {
    pub fn new(window: Arc<Window>, session: Session) -> Result<Self> {
        let gpu = GpuContext::new(window.clone())?;
        let egui_overlay = EguiOverlay::new(&gpu, &window);

        let scrub = ScrubBar::new(session.settings.scrub_unit, session.player.total_frames());
        let dispatcher = Dispatcher::new(session.settings.export_enabled);

        Ok(Self {
            gpu,
            egui_overlay,
            window,
            quit_requested: false,
            player: session.player,
            events: session.events,
            scrub,
            dispatcher,
            texture: None,
            input: session.input,
            export_path: session.export_path,
            export: ExportSlot::default(),
            settings: session.settings,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    /// Drain player events and check on the export.
    pub fn update(&mut self) {
        let mut latest: Option<Arc<DecodedFrame>> = None;
        for event in self.events.try_iter() {
            match event {
                PlayerEvent::Position(frame) => self.scrub.on_position(frame),
                PlayerEvent::Frame { image, .. } => latest = Some(image),
                PlayerEvent::EndOfStream => log::info!("End of stream"),
            }
        }
        // Only the newest frame is worth uploading
        if let Some(image) = latest {
            self.upload_frame(&image);
        }

        if self.export.poll() && self.settings.quit_after_export {
            log::info!("Export finished, quitting");
            self.quit_requested = true;
        }
    }

    fn upload_frame(&mut self, image: &DecodedFrame) {
        let size = [image.width as usize, image.height as usize];
        if image.data.len() != DecodedFrame::byte_len(image.width, image.height) {
            log::warn!("Dropping malformed {}x{} frame", image.width, image.height);
            return;
        }
        let color_image = ColorImage::from_rgba_unmultiplied(size, &image.data);
        match self.texture.as_mut() {
            Some(texture) => texture.set(color_image, TextureOptions::LINEAR),
            None => {
                self.texture = Some(self.egui_overlay.context().load_texture(
                    "video-frame",
                    color_image,
                    TextureOptions::LINEAR,
                ));
            }
        }
    }

    pub fn handle_input(&mut self, event: &InputEvent) {
        match self.dispatcher.dispatch(event, &self.player) {
            Dispatch::Continue => {}
            Dispatch::Quit => self.quit_requested = true,
            Dispatch::Export => {
                let (input, output) = (self.input.clone(), self.export_path.clone());
                let settings = &self.settings;
                self.export
                    .start(|| ExportTask::reverse(&input, &output, settings));
            }
        }
    }

    /// Stop playback and any running export. Called once before exit.
    pub fn shutdown(&mut self) {
        if self.export.is_running() {
            self.export.cancel();
        }
        self.player.stop();
    }

    fn status(&self) -> StatusInfo {
        StatusInfo {
            frame: self.player.position(),
            total_frames: self.player.total_frames(),
            fps: self.player.fps(),
            paused: self.player.is_paused(),
            at_end: self.player.at_end(),
            decode_gaps: self.player.decode_gaps(),
            export_enabled: self.settings.export_enabled,
            export: self.export.state().clone(),
        }
    }

    /// Build the egui frame. Scrub input turns into seeks here.
    pub fn draw_ui(&mut self) {
        let status = self.status();
        let media_size = self.player.dimensions();
        let mut seek = None;

        self.egui_overlay.run(&self.window, |ctx| {
            seek = ui::draw_player(
                ctx,
                PlayerView {
                    texture: self.texture.as_ref(),
                    media_size,
                    scrub: &mut self.scrub,
                    status: &status,
                },
            );
        });

        if let Some(frame) = seek {
            self.player.seek(frame);
        }
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let (frame, view) = self.gpu.acquire()?;
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scrub-player-encoder"),
            });

        self.egui_overlay.paint(&self.gpu, &mut encoder, &view);

        self.gpu.queue.submit([encoder.finish()]);
        frame.present();
        Ok(())
    }
}

/// Export destination: `--output` if given, else derived from the input name.
pub fn export_path(input: &std::path::Path, output: Option<PathBuf>, suffix: &str) -> PathBuf {
    output.unwrap_or_else(|| export::reverse_output_path(input, suffix))
}
