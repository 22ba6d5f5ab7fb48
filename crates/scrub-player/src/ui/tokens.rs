use egui::Color32;

pub const CANVAS: Color32 = Color32::from_rgb(0x12, 0x12, 0x12);
pub const PANEL: Color32 = Color32::from_rgb(0x1E, 0x1E, 0x1E);
pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(0xE8, 0xE8, 0xE8);
pub const TEXT_SECONDARY: Color32 = Color32::from_rgb(0xA0, 0xA0, 0xA0);
pub const ERROR: Color32 = Color32::from_rgb(0xE0, 0x60, 0x60);
pub const WARNING: Color32 = Color32::from_rgb(0xD4, 0xA0, 0x40);
pub const SUCCESS: Color32 = Color32::from_rgb(0x50, 0xC0, 0x70);

// Layout
pub const SPACING: f32 = 8.0;
pub const MIN_INTERACT_HEIGHT: f32 = 28.0;
pub const MIN_INTERACT_WIDTH: f32 = 44.0;

// Typography
pub const BODY_SIZE: f32 = 14.0;
pub const SMALL_SIZE: f32 = 12.0;
