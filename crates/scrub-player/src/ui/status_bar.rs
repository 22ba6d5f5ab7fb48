use egui::{Color32, RichText, Ui};

use crate::input::Shortcuts;
use crate::ui::tokens::*;

/// Progress of the reverse export as shown to the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ExportState {
    #[default]
    Idle,
    Running { file_name: String },
    Done { file_name: String, written: u64, skipped: u64 },
    Failed(String),
}

impl ExportState {
    pub fn label(&self) -> Option<(String, Color32)> {
        match self {
            ExportState::Idle => None,
            ExportState::Running { file_name } => {
                Some((format!("Exporting {file_name}..."), WARNING))
            }
            ExportState::Done {
                file_name,
                written,
                skipped,
            } => {
                let mut text = format!("Exported {file_name} ({written} frames");
                if *skipped > 0 {
                    text.push_str(&format!(", {skipped} skipped"));
                }
                text.push(')');
                Some((text, SUCCESS))
            }
            ExportState::Failed(err) => Some((format!("Export failed: {err}"), ERROR)),
        }
    }
}

/// Snapshot of the player taken once per redraw.
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub frame: usize,
    pub total_frames: usize,
    pub fps: f64,
    pub paused: bool,
    pub at_end: bool,
    pub decode_gaps: u64,
    pub export_enabled: bool,
    pub export: ExportState,
}

/// "frame 12 / 240", 1-based for display.
pub fn frame_label(frame: usize, total: usize) -> String {
    if total == 0 {
        return "no frames".to_string();
    }
    format!("frame {} / {total}", frame.min(total - 1) + 1)
}

pub fn draw_status_bar(ui: &mut Ui, info: &StatusInfo) {
    ui.horizontal(|ui| {
        ui.label(
            RichText::new(frame_label(info.frame, info.total_frames))
                .size(SMALL_SIZE)
                .color(TEXT_PRIMARY),
        );

        let (state, color) = if info.at_end {
            ("end", TEXT_SECONDARY)
        } else if info.paused {
            ("paused", WARNING)
        } else {
            ("playing", SUCCESS)
        };
        ui.separator();
        ui.colored_label(color, RichText::new(state).size(SMALL_SIZE));

        ui.label(
            RichText::new(format!("{:.2} fps", info.fps))
                .size(SMALL_SIZE)
                .color(TEXT_SECONDARY),
        );

        if info.decode_gaps > 0 {
            ui.separator();
            ui.colored_label(
                ERROR,
                RichText::new(format!("{} unreadable", info.decode_gaps)).size(SMALL_SIZE),
            );
        }

        if let Some((text, color)) = info.export.label() {
            ui.separator();
            ui.colored_label(color, RichText::new(text).size(SMALL_SIZE));
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            // Right-to-left, so reverse to keep the legend in reading order
            for (key, action) in Shortcuts::legend(info.export_enabled).iter().rev() {
                ui.label(
                    RichText::new(format!("{key}: {action}"))
                        .size(SMALL_SIZE)
                        .color(TEXT_SECONDARY),
                );
            }
        });
    });
}
