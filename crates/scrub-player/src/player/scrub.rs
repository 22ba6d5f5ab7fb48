use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Unit shown on the scrub widget. The player itself always works in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrubUnit {
    #[default]
    Frames,
    Percent,
}

/// Widget-side state of the scrub bar.
///
/// Positions pushed by the pacing thread only move the handle; values the
/// user sets turn into seek targets. While the user holds the handle,
/// pushed positions are ignored so the handle doesn't jump under the cursor.
#[derive(Debug, Clone)]
pub struct ScrubBar {
    unit: ScrubUnit,
    total_frames: usize,
    value: f64,
    frame: usize,
    dragging: bool,
}

impl ScrubBar {
    pub fn new(unit: ScrubUnit, total_frames: usize) -> Self {
        Self {
            unit,
            total_frames,
            value: 0.0,
            frame: 0,
            dragging: false,
        }
    }

    pub fn unit(&self) -> ScrubUnit {
        self.unit
    }

    fn last_frame(&self) -> usize {
        self.total_frames.saturating_sub(1)
    }

    /// Widget range in widget units.
    pub fn range(&self) -> RangeInclusive<f64> {
        match self.unit {
            ScrubUnit::Frames => 0.0..=self.last_frame() as f64,
            ScrubUnit::Percent => 0.0..=100.0,
        }
    }

    /// Frame index → widget value.
    pub fn to_widget(&self, frame: usize) -> f64 {
        let frame = frame.min(self.last_frame());
        match self.unit {
            ScrubUnit::Frames => frame as f64,
            ScrubUnit::Percent => {
                if self.last_frame() == 0 {
                    0.0
                } else {
                    frame as f64 / self.last_frame() as f64 * 100.0
                }
            }
        }
    }

    /// Widget value → frame index, clamped to the valid range.
    pub fn to_frame(&self, value: f64) -> usize {
        let (lo, hi) = (*self.range().start(), *self.range().end());
        let value = if value.is_finite() { value.clamp(lo, hi) } else { lo };
        let frame = match self.unit {
            ScrubUnit::Frames => value.round(),
            ScrubUnit::Percent => (value / 100.0 * self.last_frame() as f64).round(),
        };
        (frame.max(0.0) as usize).min(self.last_frame())
    }

    /// Current widget value, bound to the slider.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    /// Player → widget. Ignored while the user holds the handle.
    pub fn on_position(&mut self, frame: usize) {
        if self.dragging {
            return;
        }
        self.frame = frame.min(self.last_frame());
        self.value = self.to_widget(self.frame);
    }

    /// Widget → player. Returns the frame to seek to when the user moved
    /// the handle to a different frame.
    pub fn on_user_change(&mut self, value: f64) -> Option<usize> {
        if self.total_frames == 0 {
            return None;
        }
        let frame = self.to_frame(value);
        self.value = value;
        if frame == self.frame {
            return None;
        }
        self.frame = frame;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_range_is_last_index() {
        let bar = ScrubBar::new(ScrubUnit::Frames, 10);
        assert_eq!(bar.range(), 0.0..=9.0);
        let bar = ScrubBar::new(ScrubUnit::Percent, 10);
        assert_eq!(bar.range(), 0.0..=100.0);
    }

    #[test]
    fn percent_conversion_hits_both_ends() {
        let bar = ScrubBar::new(ScrubUnit::Percent, 101);
        assert_eq!(bar.to_frame(0.0), 0);
        assert_eq!(bar.to_frame(50.0), 50);
        assert_eq!(bar.to_frame(100.0), 100);
        assert!((bar.to_widget(100) - 100.0).abs() < 1e-9);
        assert!((bar.to_widget(25) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_widget_values_clamp() {
        let bar = ScrubBar::new(ScrubUnit::Frames, 10);
        assert_eq!(bar.to_frame(-3.0), 0);
        assert_eq!(bar.to_frame(42.0), 9);
        assert_eq!(bar.to_frame(f64::NAN), 0);
    }

    #[test]
    fn user_change_yields_seek_once() {
        let mut bar = ScrubBar::new(ScrubUnit::Frames, 10);
        assert_eq!(bar.on_user_change(4.2), Some(4));
        assert_eq!(bar.on_user_change(3.9), None);
        assert_eq!(bar.on_user_change(7.0), Some(7));
    }

    #[test]
    fn pushed_position_moves_handle() {
        let mut bar = ScrubBar::new(ScrubUnit::Percent, 11);
        bar.on_position(5);
        assert_eq!(bar.frame, 5);
        assert!((bar.value() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn pushed_position_does_not_echo_as_seek() {
        let mut bar = ScrubBar::new(ScrubUnit::Frames, 10);
        bar.on_position(6);
        let value = bar.value();
        assert_eq!(bar.on_user_change(value), None);
    }

    #[test]
    fn dragging_wins_over_pushed_positions() {
        let mut bar = ScrubBar::new(ScrubUnit::Frames, 10);
        bar.set_dragging(true);
        assert_eq!(bar.on_user_change(8.0), Some(8));
        bar.on_position(2);
        assert_eq!(bar.frame, 8);
        bar.set_dragging(false);
        bar.on_position(2);
        assert_eq!(bar.frame, 2);
    }

    #[test]
    fn empty_source_never_seeks() {
        let mut bar = ScrubBar::new(ScrubUnit::Frames, 0);
        assert_eq!(bar.range(), 0.0..=0.0);
        assert_eq!(bar.on_user_change(3.0), None);
    }
}
