use std::path::PathBuf;

use thiserror::Error;

/// A decoded frame ready for display or re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub data: Vec<u8>,   // RGBA8
    pub width: u32,
    pub height: u32,
}

impl DecodedFrame {
    /// Byte length of one RGBA8 frame at the given dimensions.
    pub fn byte_len(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 4
    }
}

/// Video metadata from ffprobe.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_secs: f64,
    pub frame_count: usize,
}

impl VideoMeta {
    /// Time between two frames. Falls back to 30 fps for nonsensical rates.
    pub fn frame_interval(&self) -> std::time::Duration {
        let fps = if self.fps.is_finite() && self.fps > 0.0 {
            self.fps
        } else {
            DEFAULT_FPS
        };
        std::time::Duration::from_micros((1_000_000.0 / fps).round() as u64)
    }

    /// Presentation time of a frame index in seconds.
    pub fn frame_time_secs(&self, index: usize) -> f64 {
        if self.fps > 0.0 {
            index as f64 / self.fps
        } else {
            0.0
        }
    }
}

pub const DEFAULT_FPS: f64 = 30.0;

/// How the player obtains frames from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMode {
    /// Decode on demand through an ffmpeg pipe. Seeking restarts the pipe.
    #[default]
    Stream,
    /// Decode every frame once at load time and keep them in memory.
    Preload,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("could not open video '{}': {reason}", path.display())]
    OpenFailed { path: PathBuf, reason: String },
    #[error("ffmpeg/ffprobe not found on PATH")]
    BackendUnavailable,
    #[error("video is {duration_secs:.1}s long, preload limit is {limit_secs:.1}s")]
    TooLongToPreload { duration_secs: f64, limit_secs: f64 },
    #[error("frame {index} is out of range (source has {frame_count} frames)")]
    SeekOutOfRange { index: usize, frame_count: usize },
    #[error("frame is {actual} bytes, expected {expected}")]
    FrameSizeMismatch { expected: usize, actual: usize },
    #[error("encoder failed: {0}")]
    Encoder(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
