use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use serde::{Deserialize, Serialize};

use super::types::{DecodedFrame, MediaError, VideoMeta};

/// Output codec for exported videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportCodec {
    /// Uncompressed frames. Large files, no generation loss.
    #[default]
    Rawvideo,
    Mjpeg,
    Ffv1,
    Mpeg4,
}

impl ExportCodec {
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            ExportCodec::Rawvideo => "rawvideo",
            ExportCodec::Mjpeg => "mjpeg",
            ExportCodec::Ffv1 => "ffv1",
            ExportCodec::Mpeg4 => "mpeg4",
        }
    }

    /// Pixel format written to the file. `None` keeps the RGBA input.
    pub fn output_pix_fmt(self) -> Option<&'static str> {
        match self {
            // Uncompressed AVI (fourcc 0) is bottom-up BGR
            ExportCodec::Rawvideo => Some("bgr24"),
            ExportCodec::Mjpeg => Some("yuvj420p"),
            ExportCodec::Ffv1 => None,
            ExportCodec::Mpeg4 => Some("yuv420p"),
        }
    }
}

/// Stream parameters for a new output file, copied from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSpec {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: ExportCodec,
}

impl WriterSpec {
    pub fn from_meta(meta: &VideoMeta, codec: ExportCodec) -> Self {
        Self {
            width: meta.width,
            height: meta.height,
            fps: meta.fps,
            codec,
        }
    }
}

/// Sink for encoded output. Frames are appended in call order.
pub trait VideoWriter: Send {
    fn write_frame(&mut self, frame: &DecodedFrame) -> Result<(), MediaError>;

    /// Flush and close the output. Must be called once after the last frame.
    fn finish(&mut self) -> Result<(), MediaError>;
}

/// Encodes RGBA frames through an `ffmpeg` process fed on stdin.
pub struct FfmpegWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    spec: WriterSpec,
    path: PathBuf,
    frames_written: u64,
}

impl FfmpegWriter {
    pub fn create(path: &Path, spec: WriterSpec) -> Result<Self, MediaError> {
        let mut child = encoder_command(path, &spec)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MediaError::Encoder("ffmpeg: no stdin pipe".to_string()));
        };

        log::info!(
            "Writing {} ({}x{} @ {:.3} fps, codec {})",
            path.display(),
            spec.width,
            spec.height,
            spec.fps,
            spec.codec.ffmpeg_name(),
        );

        Ok(Self {
            child,
            stdin: Some(stdin),
            spec,
            path: path.to_path_buf(),
            frames_written: 0,
        })
    }
}

impl VideoWriter for FfmpegWriter {
    fn write_frame(&mut self, frame: &DecodedFrame) -> Result<(), MediaError> {
        let expected = DecodedFrame::byte_len(self.spec.width, self.spec.height);
        if frame.data.len() != expected {
            return Err(MediaError::FrameSizeMismatch {
                expected,
                actual: frame.data.len(),
            });
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::Encoder("writer already finished".to_string()))?;
        stdin.write_all(&frame.data)?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), MediaError> {
        // Closing stdin signals end of input
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if !status.success() {
            return Err(MediaError::Encoder(format!(
                "ffmpeg exited with {status} while writing {}",
                self.path.display()
            )));
        }
        log::info!(
            "Finished {} ({} frames)",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            drop(self.stdin.take());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn encoder_command(path: &Path, spec: &WriterSpec) -> Command {
    let mut command = Command::new("ffmpeg");
    command
        .args([
            "-y",
            "-v", "error",
            "-f", "rawvideo",
            "-pix_fmt", "rgba",
            "-s", &format!("{}x{}", spec.width, spec.height),
            "-r", &format!("{}", spec.fps),
            "-i", "pipe:0",
            "-c:v", spec.codec.ffmpeg_name(),
        ]);
    if let Some(pix_fmt) = spec.codec.output_pix_fmt() {
        command.args(["-pix_fmt", pix_fmt]);
    }
    command.arg(path);
    command
}
