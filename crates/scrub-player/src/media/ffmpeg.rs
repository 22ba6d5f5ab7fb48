//! ffprobe/ffmpeg subprocess plumbing.
//!
//! Metadata comes from a single `ffprobe` call at open time. Frames arrive
//! as raw RGBA on ffmpeg's stdout; a pipe started with `-ss` ahead of `-i`
//! begins at an arbitrary timestamp, which is how streaming sources seek.
//! A preloaded 1280x720 clip costs about 3.7 MB per frame.

use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::OnceLock;

use serde::Deserialize;

use super::types::{DecodedFrame, VideoMeta, DEFAULT_FPS};

fn tool_runs(name: &str) -> bool {
    Command::new(name)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Whether both `ffprobe` and `ffmpeg` can be launched. Checked once per process.
pub fn ffmpeg_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| tool_runs("ffprobe") && tool_runs("ffmpeg"))
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_number<T: std::str::FromStr>(field: Option<&String>) -> Option<T> {
    field.and_then(|s| s.trim().parse().ok())
}

/// Ask ffprobe for the first video stream of `path`.
pub fn probe_video(path: &Path) -> Result<VideoMeta, String> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0", "-of", "json"])
        .args([
            "-show_entries",
            "stream=codec_type,width,height,avg_frame_rate,r_frame_rate,nb_frames,duration:format=duration",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| format!("could not run ffprobe: {e}"))?;

    if !output.status.success() {
        return Err(format!("ffprobe exited with {}", output.status));
    }
    parse_probe_output(&output.stdout)
}

/// Turn ffprobe's JSON into `VideoMeta`.
///
/// `avg_frame_rate` wins over `r_frame_rate`. When the container has no
/// `nb_frames` entry (mkv, webm) the count is estimated from duration.
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoMeta, String> {
    let probe: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| format!("unreadable ffprobe output: {e}"))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| "No video stream found".to_string())?;

    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err("video stream has no dimensions".to_string());
    };

    let rate = stream
        .avg_frame_rate
        .as_deref()
        .filter(|r| *r != "0/0")
        .or(stream.r_frame_rate.as_deref());
    let fps = rate.map_or(DEFAULT_FPS, parse_frame_rate);

    let duration_secs = parse_number::<f64>(probe.format.duration.as_ref())
        .or_else(|| parse_number(stream.duration.as_ref()))
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    let frame_count = parse_number::<usize>(stream.nb_frames.as_ref())
        .unwrap_or_else(|| (duration_secs * fps).round() as usize);

    Ok(VideoMeta {
        width,
        height,
        fps,
        duration_secs,
        frame_count,
    })
}

/// "30000/1001" or "25" to frames per second. Anything unusable gives 30.
pub fn parse_frame_rate(rate: &str) -> f64 {
    let fps = match rate.split_once('/') {
        Some((num, den)) => match (num.parse::<f64>(), den.parse::<f64>()) {
            (Ok(n), Ok(d)) if d > 0.0 => n / d,
            _ => DEFAULT_FPS,
        },
        None => rate.parse().unwrap_or(DEFAULT_FPS),
    };
    if fps.is_finite() && fps > 0.0 { fps } else { DEFAULT_FPS }
}

/// ffmpeg invocation writing raw RGBA frames of `path` to stdout,
/// starting `start_secs` into the stream.
pub fn decode_command(path: &Path, meta: &VideoMeta, start_secs: f64) -> Command {
    let mut command = Command::new("ffmpeg");
    command.args(["-v", "error", "-nostdin"]);
    if start_secs > 0.0 {
        // Before -i: fast input seek, accurate since ffmpeg 2.1
        command.arg("-ss").arg(format!("{start_secs:.6}"));
    }
    command
        .arg("-i")
        .arg(path)
        .args(["-map", "0:v:0", "-an", "-sn", "-f", "rawvideo", "-pix_fmt", "rgba"])
        .arg("-s")
        .arg(format!("{}x{}", meta.width, meta.height))
        .arg("pipe:1");
    command
}

/// A running decoder process and its frame pipe.
pub struct FramePipe {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
}

impl FramePipe {
    pub fn spawn(path: &Path, meta: &VideoMeta, start_secs: f64) -> std::io::Result<Self> {
        let mut child = decode_command(path, meta, start_secs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(std::io::Error::other("ffmpeg started without a stdout pipe"));
        };
        log::debug!("ffmpeg decoding {} from {start_secs:.3}s", path.display());

        Ok(Self {
            child,
            stdout,
            width: meta.width,
            height: meta.height,
        })
    }

    /// Next frame from the pipe, `Ok(None)` once ffmpeg runs dry.
    /// A trailing partial frame counts as the end.
    pub fn read_frame(&mut self) -> std::io::Result<Option<DecodedFrame>> {
        let mut data = vec![0u8; DecodedFrame::byte_len(self.width, self.height)];
        if let Err(e) = self.stdout.read_exact(&mut data) {
            return match e.kind() {
                std::io::ErrorKind::UnexpectedEof => Ok(None),
                _ => Err(e),
            };
        }
        Ok(Some(DecodedFrame {
            data,
            width: self.width,
            height: self.height,
        }))
    }
}

impl Drop for FramePipe {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Decode every frame of `path` with one ffmpeg run, first to last.
pub fn decode_all_frames(path: &Path, meta: &VideoMeta) -> Result<Vec<DecodedFrame>, String> {
    let mib = |frames: usize| frames * DecodedFrame::byte_len(meta.width, meta.height) / (1 << 20);
    log::info!(
        "Preloading {} ({} frames, about {} MiB)",
        path.display(),
        meta.frame_count,
        mib(meta.frame_count)
    );

    let mut pipe =
        FramePipe::spawn(path, meta, 0.0).map_err(|e| format!("could not start ffmpeg: {e}"))?;
    let frames = std::iter::from_fn(|| pipe.read_frame().transpose())
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| format!("reading decoded frames failed: {e}"))?;

    match frames.len() {
        0 => log::warn!("ffmpeg produced no frames for {}", path.display()),
        n => log::info!("Preloaded {n} frames ({} MiB)", mib(n)),
    }
    Ok(frames)
}
