use egui::{Color32, Pos2, Rect, RichText, TextureHandle, Ui, Vec2};

use crate::player::scrub::{ScrubBar, ScrubUnit};
use crate::ui::tokens::*;

/// Largest rect with the media's aspect ratio that fits inside `area`,
/// centered. Wider media is letterboxed top/bottom, taller media
/// pillarboxed left/right.
pub fn fit_rect(media_w: u32, media_h: u32, area: Rect) -> Rect {
    if media_w == 0 || media_h == 0 || area.width() <= 0.0 || area.height() <= 0.0 {
        return Rect::from_center_size(area.center(), Vec2::ZERO);
    }
    let media_aspect = media_w as f32 / media_h as f32;
    let area_aspect = area.width() / area.height();

    let size = if media_aspect > area_aspect {
        Vec2::new(area.width(), area.width() / media_aspect)
    } else {
        Vec2::new(area.height() * media_aspect, area.height())
    };
    Rect::from_center_size(area.center(), size)
}

/// Paint the current frame into the available space.
pub fn draw_frame(ui: &mut Ui, texture: Option<&TextureHandle>, media_w: u32, media_h: u32) {
    let area = ui.available_rect_before_wrap();
    ui.painter().rect_filled(area, 0.0, Color32::BLACK);

    match texture {
        Some(texture) => {
            let rect = fit_rect(media_w, media_h, area);
            let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
            ui.painter().image(texture.id(), rect, uv, Color32::WHITE);
        }
        None => {
            ui.painter().text(
                area.center(),
                egui::Align2::CENTER_CENTER,
                "waiting for first frame",
                egui::FontId::proportional(BODY_SIZE),
                TEXT_SECONDARY,
            );
        }
    }
    ui.allocate_rect(area, egui::Sense::hover());
}

/// Full-width scrub slider. Returns the frame to seek to when the user
/// moved the handle.
pub fn draw_scrub_bar(ui: &mut Ui, scrub: &mut ScrubBar) -> Option<usize> {
    let mut value = scrub.value();
    let unit = scrub.unit();

    let response = ui
        .horizontal(|ui| {
            let suffix = match unit {
                ScrubUnit::Frames => "frame",
                ScrubUnit::Percent => "%",
            };
            ui.label(RichText::new(suffix).size(SMALL_SIZE).color(TEXT_SECONDARY));

            ui.spacing_mut().slider_width = (ui.available_width() - 80.0).max(MIN_INTERACT_WIDTH);
            let slider = egui::Slider::new(&mut value, scrub.range())
                .show_value(true)
                .custom_formatter(move |v, _| match unit {
                    ScrubUnit::Frames => format!("{v:.0}"),
                    ScrubUnit::Percent => format!("{v:.1}"),
                });
            ui.add(slider)
        })
        .inner;

    scrub.set_dragging(response.dragged() || response.is_pointer_button_down_on());
    if response.changed() {
        scrub.on_user_change(value)
    } else {
        None
    }
}
