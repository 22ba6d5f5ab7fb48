mod app;
mod cli;
mod export;
mod gpu;
mod input;
mod media;
mod player;
mod settings;
mod ui;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Parser;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use app::{App, Session};
use input::{InputEvent, Key};
use player::PlaybackController;
use player::observer::ChannelObserver;
use settings::PlayerSettings;

/// Frames buffered between the pacing thread and the window.
const EVENT_QUEUE_DEPTH: usize = 16;

struct PlayerApp {
    app: Option<App>,
    session: Option<Session>,
    window: Option<Arc<Window>>,
    title: String,
    /// Set when the window or display could not be created; returned from `main`.
    startup_error: Option<anyhow::Error>,
}

impl PlayerApp {
    fn new(session: Session) -> Self {
        let title = session.settings.window_title.clone();
        Self {
            app: None,
            session: Some(session),
            window: None,
            title,
            startup_error: None,
        }
    }

    /// Exit status once the event loop returns.
    fn finish(self) -> Result<()> {
        match self.startup_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn quit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(app) = self.app.as_mut() {
            app.shutdown();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for PlayerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let Some(session) = self.session.take() else {
            return;
        };

        let attrs = WindowAttributes::default()
            .with_title(self.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.startup_error = Some(anyhow::Error::new(e).context("creating window"));
                event_loop.exit();
                return;
            }
        };

        center_window(&window, event_loop);
        self.window = Some(window.clone());

        match App::new(window, session) {
            Ok(app) => {
                self.app = Some(app);
                log::info!("Player window ready");
            }
            Err(e) => {
                self.startup_error = Some(e.context("initializing display"));
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(app) = self.app.as_mut() else {
            return;
        };

        // egui sees every event first
        let egui_has_keyboard = app.egui_overlay.handle_event(&app.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                app.handle_input(&InputEvent::WindowClosed);
            }
            WindowEvent::Resized(size) => {
                app.resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } if !egui_has_keyboard => {
                app.handle_input(&InputEvent::Key(Key::from(&logical_key)));
            }
            WindowEvent::RedrawRequested => {
                app.update();
                app.draw_ui();

                match app.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        app.gpu.reconfigure();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory");
                        app.quit_requested = true;
                    }
                    Err(e) => {
                        log::warn!("Surface error: {e}");
                    }
                }

                app.window.request_redraw();
            }
            _ => {}
        }

        if self.app.as_ref().is_some_and(|app| app.quit_requested) {
            self.quit(event_loop);
        }
    }
}

/// Middle of the primary monitor, or of whichever monitor winit lists first.
fn center_window(window: &Window, event_loop: &ActiveEventLoop) {
    let Some(monitor) = event_loop
        .primary_monitor()
        .or_else(|| event_loop.available_monitors().next())
    else {
        return;
    };
    let margin = |screen: u32, outer: u32| (screen.saturating_sub(outer) / 2) as i32;
    let (screen, outer, origin) = (monitor.size(), window.outer_size(), monitor.position());
    window.set_outer_position(winit::dpi::PhysicalPosition::new(
        origin.x + margin(screen.width, outer.width),
        origin.y + margin(screen.height, outer.height),
    ));
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = cli::Args::parse();

    let mut settings = PlayerSettings::load();
    if !PlayerSettings::config_path().exists() {
        settings.save();
    }
    args.apply(&mut settings);

    let export_path = app::export_path(&args.input, args.output.clone(), &settings.export_suffix);

    if args.export {
        let report = export::run_reverse_export(
            &args.input,
            &export_path,
            &settings,
            &AtomicBool::new(false),
        )
        .with_context(|| format!("reverse export of {} failed", args.input.display()))?;
        log::info!(
            "Done: {} of {} frames written",
            report.written,
            report.total_frames
        );
        return Ok(());
    }

    let (observer, events) = ChannelObserver::new(EVENT_QUEUE_DEPTH);
    let player = PlaybackController::start(&args.input, &settings, Box::new(observer))
        .with_context(|| format!("cannot play {}", args.input.display()))?;

    let session = Session {
        player,
        events,
        input: args.input,
        export_path,
        settings,
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    let mut player_app = PlayerApp::new(session);
    event_loop.run_app(&mut player_app)?;

    player_app.finish()
}
