pub mod decoder;
pub mod ffmpeg;
pub mod types;
pub mod writer;

use std::path::Path;
use std::sync::Arc;

use decoder::{PreloadedVideo, StreamingVideo};
use types::{DecodeMode, DecodedFrame, MediaError, VideoMeta};

/// An opened video that can be read sequentially or repositioned by frame index.
pub trait VideoSource: Send {
    fn meta(&self) -> &VideoMeta;

    /// Position the source so the next `read_frame` returns frame `index`.
    fn seek(&mut self, index: usize) -> Result<(), MediaError>;

    /// Decode the frame at the current position and advance by one.
    /// `Ok(None)` at end of stream.
    fn read_frame(&mut self) -> Result<Option<Arc<DecodedFrame>>, MediaError>;

    fn frame_count(&self) -> usize {
        self.meta().frame_count
    }
}

/// Open a video file with the requested decode strategy.
pub fn open_source(
    path: &Path,
    mode: DecodeMode,
    max_predecode_secs: f64,
) -> Result<Box<dyn VideoSource>, MediaError> {
    if !path.is_file() {
        return Err(MediaError::OpenFailed {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }
    if !ffmpeg::ffmpeg_available() {
        return Err(MediaError::BackendUnavailable);
    }

    let meta = ffmpeg::probe_video(path).map_err(|reason| MediaError::OpenFailed {
        path: path.to_path_buf(),
        reason,
    })?;

    log::info!(
        "Opened {}: {}x{}, {:.3} fps, {} frames ({:.1}s)",
        path.display(),
        meta.width,
        meta.height,
        meta.fps,
        meta.frame_count,
        meta.duration_secs,
    );

    Ok(match mode {
        DecodeMode::Stream => Box::new(StreamingVideo::new(path, meta)),
        DecodeMode::Preload => Box::new(PreloadedVideo::open(path, meta, max_predecode_secs)?),
    })
}

#[cfg(test)]
pub mod test_support {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use super::VideoSource;
    use super::types::{DecodedFrame, MediaError, VideoMeta};

    pub fn test_meta(frame_count: usize, fps: f64) -> VideoMeta {
        VideoMeta {
            width: 2,
            height: 2,
            fps,
            duration_secs: frame_count as f64 / fps,
            frame_count,
        }
    }

    /// Frames whose every byte equals the frame index (mod 256).
    pub fn solid_frames(count: usize) -> Vec<DecodedFrame> {
        (0..count)
            .map(|i| DecodedFrame {
                data: vec![i as u8; DecodedFrame::byte_len(2, 2)],
                width: 2,
                height: 2,
            })
            .collect()
    }

    /// In-memory source that fails to decode selected frame indices.
    pub struct GappyVideo {
        meta: VideoMeta,
        frames: Vec<Arc<DecodedFrame>>,
        gaps: HashSet<usize>,
        position: usize,
    }

    impl GappyVideo {
        pub fn new(count: usize, fps: f64, gaps: &[usize]) -> Self {
            Self {
                meta: test_meta(count, fps),
                frames: solid_frames(count).into_iter().map(Arc::new).collect(),
                gaps: gaps.iter().copied().collect(),
                position: 0,
            }
        }
    }

    impl VideoSource for GappyVideo {
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
            let index = self.position;
            self.position += 1;
            if self.gaps.contains(&index) {
                return Err(MediaError::Io(std::io::Error::other("corrupt packet")));
            }
            Ok(self.frames.get(index).cloned())
        }
    }

    /// In-memory source where every decode takes `delay`.
    pub struct SlowVideo {
        inner: GappyVideo,
        delay: Duration,
    }

    impl SlowVideo {
        pub fn new(count: usize, fps: f64, delay: Duration) -> Self {
            Self {
                inner: GappyVideo::new(count, fps, &[]),
                delay,
            }
        }
    }

    impl VideoSource for SlowVideo {
        fn meta(&self) -> &VideoMeta {
            self.inner.meta()
        }

        fn seek(&mut self, index: usize) -> Result<(), MediaError> {
            self.inner.seek(index)
        }

        fn read_frame(&mut self) -> Result<Option<Arc<DecodedFrame>>, MediaError> {
            std::thread::sleep(self.delay);
            self.inner.read_frame()
        }
    }
}
