use egui::Context;
use winit::event::WindowEvent;
use winit::window::Window;

use super::tokens;
use crate::gpu::GpuContext;

/// Output of one egui pass, waiting to be painted.
struct PreparedFrame {
    primitives: Vec<egui::ClippedPrimitive>,
    textures: egui::TexturesDelta,
    pixels_per_point: f32,
}

/// egui bound to the player window: window events in, painted pixels out.
pub struct EguiOverlay {
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    prepared: Option<PreparedFrame>,
}

fn apply_style(ctx: &Context) {
    ctx.set_visuals(egui::Visuals::dark());
    ctx.style_mut(|style| {
        style.spacing.interact_size =
            egui::vec2(tokens::MIN_INTERACT_WIDTH, tokens::MIN_INTERACT_HEIGHT);
        style.spacing.item_spacing = egui::vec2(tokens::SPACING, tokens::SPACING / 2.0);
        for (text_style, size) in [
            (egui::TextStyle::Body, tokens::BODY_SIZE),
            (egui::TextStyle::Button, tokens::BODY_SIZE),
            (egui::TextStyle::Small, tokens::SMALL_SIZE),
        ] {
            style
                .text_styles
                .insert(text_style, egui::FontId::proportional(size));
        }
    });
}

impl EguiOverlay {
    pub fn new(gpu: &GpuContext, window: &Window) -> Self {
        let ctx = Context::default();
        apply_style(&ctx);

        let viewport = ctx.viewport_id();
        let state = egui_winit::State::new(ctx, viewport, window, None, None, None);
        let renderer = egui_wgpu::Renderer::new(
            &gpu.device,
            gpu.format(),
            egui_wgpu::RendererOptions {
                msaa_samples: 1,
                ..Default::default()
            },
        );

        Self {
            state,
            renderer,
            prepared: None,
        }
    }

    pub fn context(&self) -> &Context {
        self.state.egui_ctx()
    }

    /// Feed a window event to egui. Returns true when egui keeps a key
    /// press for itself (a focused text field), so it must not reach the
    /// player shortcuts.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.state.on_window_event(window, event);
        response.consumed && self.state.egui_ctx().wants_keyboard_input()
    }

    /// Run one UI pass and keep its output for `paint`.
    pub fn run(&mut self, window: &Window, build: impl FnMut(&Context)) {
        let input = self.state.take_egui_input(window);
        let output = self.state.egui_ctx().run(input, build);
        self.state
            .handle_platform_output(window, output.platform_output);

        let primitives = self
            .state
            .egui_ctx()
            .tessellate(output.shapes, output.pixels_per_point);
        self.prepared = Some(PreparedFrame {
            primitives,
            textures: output.textures_delta,
            pixels_per_point: output.pixels_per_point,
        });
    }

    /// Paint the last prepared pass into `target`, clearing it to black.
    pub fn paint(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
    ) {
        let Some(frame) = self.prepared.take() else {
            return;
        };
        let (width, height) = gpu.size();
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: frame.pixels_per_point,
        };

        // Uploads include the video frame texture when it changed
        for (id, delta) in &frame.textures.set {
            self.renderer
                .update_texture(&gpu.device, &gpu.queue, *id, delta);
        }
        self.renderer
            .update_buffers(&gpu.device, &gpu.queue, encoder, &frame.primitives, &screen);

        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("player-ui"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            })
            .forget_lifetime();
        self.renderer.render(&mut pass, &frame.primitives, &screen);
        drop(pass);

        for id in &frame.textures.free {
            self.renderer.free_texture(id);
        }
    }
}
