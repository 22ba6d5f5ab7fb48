pub mod overlay;
pub mod status_bar;
pub mod tokens;
pub mod viewer;

pub use overlay::EguiOverlay;

use egui::{Context, TextureHandle};

use crate::player::scrub::ScrubBar;
use status_bar::StatusInfo;

/// Everything the player window draws in one pass.
pub struct PlayerView<'a> {
    pub texture: Option<&'a TextureHandle>,
    pub media_size: (u32, u32),
    pub scrub: &'a mut ScrubBar,
    pub status: &'a StatusInfo,
}

/// Draw the player UI. Returns a seek target when the user moved the
/// scrub handle.
pub fn draw_player(ctx: &Context, view: PlayerView<'_>) -> Option<usize> {
    egui::TopBottomPanel::bottom("status_bar")
        .frame(egui::Frame::new().fill(tokens::PANEL).inner_margin(egui::Margin::symmetric(8, 4)))
        .show(ctx, |ui| {
            status_bar::draw_status_bar(ui, view.status);
        });

    let seek = egui::TopBottomPanel::bottom("scrub_bar")
        .frame(egui::Frame::new().fill(tokens::CANVAS).inner_margin(egui::Margin::symmetric(8, 6)))
        .show(ctx, |ui| viewer::draw_scrub_bar(ui, view.scrub))
        .inner;

    egui::CentralPanel::default()
        .frame(egui::Frame::NONE)
        .show(ctx, |ui| {
            let (w, h) = view.media_size;
            viewer::draw_frame(ui, view.texture, w, h);
        });

    seek
}
