use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::VideoSource;
use super::ffmpeg::{self, FramePipe};
use super::types::{DecodedFrame, MediaError, VideoMeta};

/// All frames decoded up front. Instant random access.
pub struct PreloadedVideo {
    meta: VideoMeta,
    frames: Vec<Arc<DecodedFrame>>,
    position: usize,
}

impl PreloadedVideo {
    /// Wrap already-decoded frames. `meta.frame_count` is replaced by the
    /// number of frames actually present.
    pub fn from_frames(mut meta: VideoMeta, frames: Vec<DecodedFrame>) -> Self {
        meta.frame_count = frames.len();
        if let Some(first) = frames.first() {
            meta.width = first.width;
            meta.height = first.height;
        }
        Self {
            meta,
            frames: frames.into_iter().map(Arc::new).collect(),
            position: 0,
        }
    }

    /// Probe and pre-decode a file, refusing clips longer than `limit_secs`.
    pub fn open(path: &Path, meta: VideoMeta, limit_secs: f64) -> Result<Self, MediaError> {
        if meta.duration_secs > limit_secs {
            return Err(MediaError::TooLongToPreload {
                duration_secs: meta.duration_secs,
                limit_secs,
            });
        }
        let frames = ffmpeg::decode_all_frames(path, &meta).map_err(|reason| {
            MediaError::OpenFailed {
                path: path.to_path_buf(),
                reason,
            }
        })?;
        Ok(Self::from_frames(meta, frames))
    }
}

impl VideoSource for PreloadedVideo {
    fn meta(&self) -> &VideoMeta {
        &self.meta
    }

    fn seek(&mut self, index: usize) -> Result<(), MediaError> {
        if index >= self.frames.len() {
            return Err(MediaError::SeekOutOfRange {
                index,
                frame_count: self.frames.len(),
            });
        }
        self.position = index;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Arc<DecodedFrame>>, MediaError> {
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }
}

/// Frames decoded on demand from an ffmpeg pipe.
///
/// Sequential reads share one pipe. Seeking anywhere other than the next
/// frame restarts ffmpeg at the target timestamp.
pub struct StreamingVideo {
    path: PathBuf,
    meta: VideoMeta,
    pipe: Option<FramePipe>,
    /// Index of the frame the next read returns.
    position: usize,
}

impl StreamingVideo {
    pub fn new(path: &Path, meta: VideoMeta) -> Self {
        Self {
            path: path.to_path_buf(),
            meta,
            pipe: None,
            position: 0,
        }
    }

    /// The pipe ran dry before the estimated frame count. The real count
    /// is now known, so later seeks past it fail instead of restarting ffmpeg.
    fn mark_exhausted(&mut self) {
        self.pipe = None;
        if self.position < self.meta.frame_count {
            log::info!(
                "Stream ended at frame {} of an estimated {}",
                self.position,
                self.meta.frame_count
            );
            self.meta.frame_count = self.position;
        }
    }
}

impl VideoSource for StreamingVideo {
    fn meta(&self) -> &VideoMeta {
        &self.meta
    }

    fn seek(&mut self, index: usize) -> Result<(), MediaError> {
        if index >= self.meta.frame_count {
            return Err(MediaError::SeekOutOfRange {
                index,
                frame_count: self.meta.frame_count,
            });
        }
        if index != self.position || self.pipe.is_none() {
            self.pipe = None;
            self.position = index;
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Arc<DecodedFrame>>, MediaError> {
        if self.pipe.is_none() {
            let start = self.meta.frame_time_secs(self.position);
            log::debug!("Starting decode pipe at frame {} ({start:.3}s)", self.position);
            self.pipe = Some(FramePipe::spawn(&self.path, &self.meta, start)?);
        }
        let Some(pipe) = self.pipe.as_mut() else {
            return Ok(None);
        };
        match pipe.read_frame() {
            Ok(Some(frame)) => {
                self.position += 1;
                Ok(Some(Arc::new(frame)))
            }
            Ok(None) => {
                self.mark_exhausted();
                Ok(None)
            }
            Err(e) => {
                // Next read respawns at the same position
                self.pipe = None;
                Err(e.into())
            }
        }
    }
}
