//! Reverse export: writes a copy of a video with its frames in reverse order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TryRecvError};
use thiserror::Error;

use crate::media::types::{DecodeMode, MediaError};
use crate::media::writer::{FfmpegWriter, VideoWriter, WriterSpec};
use crate::media::{self, VideoSource};
use crate::settings::PlayerSettings;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to open source: {0}")]
    Open(#[source] MediaError),
    #[error("failed to create '{}': {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: MediaError,
    },
    #[error("failed to write frame {index}: {source}")]
    Write {
        index: usize,
        #[source]
        source: MediaError,
    },
    #[error("failed to finish output: {0}")]
    Finish(#[source] MediaError),
    #[error("export cancelled after {written} frames")]
    Cancelled { written: u64 },
    #[error("export thread exited without a result")]
    Aborted,
}

/// Outcome of a completed export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportReport {
    pub total_frames: usize,
    pub written: u64,
    /// Source frames that failed to decode and were left out.
    pub skipped: u64,
}

/// Output path for a reversed export: the file name's extension (from the
/// last '.') is replaced by `suffix`. Names without '.' get it appended.
pub fn reverse_output_path(input: &Path, suffix: &str) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match file_name.rfind('.') {
        Some(dot) => &file_name[..dot],
        None => file_name.as_str(),
    };
    input.with_file_name(format!("{stem}{suffix}"))
}

/// Copy every readable frame of `source` into `writer`, last frame first.
///
/// Frames that fail to decode are skipped and counted. The writer is
/// finished on success and on cancellation.
pub fn export_reverse(
    source: &mut dyn VideoSource,
    writer: &mut dyn VideoWriter,
    cancel: &AtomicBool,
) -> Result<ExportReport, ExportError> {
    let total_frames = source.frame_count();
    let mut report = ExportReport {
        total_frames,
        written: 0,
        skipped: 0,
    };

    for index in (0..total_frames).rev() {
        if cancel.load(Ordering::Relaxed) {
            writer.finish().map_err(ExportError::Finish)?;
            log::info!("Export cancelled at frame {index}");
            return Err(ExportError::Cancelled {
                written: report.written,
            });
        }

        let decoded = source.seek(index).and_then(|()| source.read_frame());
        match decoded {
            Ok(Some(frame)) => {
                writer
                    .write_frame(&frame)
                    .map_err(|source| ExportError::Write { index, source })?;
                report.written += 1;
            }
            Ok(None) => {
                report.skipped += 1;
                log::debug!("Export skipped frame {index}: stream ended early");
            }
            Err(e) => {
                report.skipped += 1;
                log::debug!("Export skipped frame {index}: {e}");
            }
        }
    }

    writer.finish().map_err(ExportError::Finish)?;

    if report.skipped > 0 {
        log::warn!(
            "Export skipped {} of {} frames that failed to decode",
            report.skipped,
            total_frames
        );
    }
    Ok(report)
}

/// Open `input`, reverse it into `output` with the configured codec.
///
/// Short clips are preloaded so the backwards walk is random access;
/// longer ones fall back to a streaming source, which restarts ffmpeg per frame.
pub fn run_reverse_export(
    input: &Path,
    output: &Path,
    settings: &PlayerSettings,
    cancel: &AtomicBool,
) -> Result<ExportReport, ExportError> {
    log::info!("export > {}", output.display());

    let mut source = match media::open_source(input, DecodeMode::Preload, settings.max_predecode_secs) {
        Err(MediaError::TooLongToPreload { duration_secs, .. }) => {
            log::warn!(
                "{duration_secs:.1}s clip is too long to preload, exporting from a stream (slow)"
            );
            media::open_source(input, DecodeMode::Stream, settings.max_predecode_secs)
        }
        other => other,
    }
    .map_err(ExportError::Open)?;

    let spec = WriterSpec::from_meta(source.meta(), settings.export_codec);
    let mut writer = FfmpegWriter::create(output, spec).map_err(|source| ExportError::Create {
        path: output.to_path_buf(),
        source,
    })?;

    let report = export_reverse(source.as_mut(), &mut writer, cancel)?;
    log::info!(
        "Exported {} frames to {} ({} skipped)",
        report.written,
        output.display(),
        report.skipped
    );
    Ok(report)
}

/// An export running on its own thread.
pub struct ExportTask {
    output: PathBuf,
    cancel: Arc<AtomicBool>,
    done_rx: Receiver<Result<ExportReport, ExportError>>,
    thread: Option<JoinHandle<()>>,
}

impl ExportTask {
    /// Run `job` on a background thread. The job should poll the flag it is
    /// given and stop early once it is set.
    pub fn spawn<F>(output: PathBuf, job: F) -> std::io::Result<Self>
    where
        F: FnOnce(&AtomicBool) -> Result<ExportReport, ExportError> + Send + 'static,
    {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = cancel.clone();

        let handle = thread::Builder::new()
            .name("scrub-player-export".into())
            .spawn(move || {
                let result = job(&cancel_flag);
                if let Err(e) = &result {
                    log::error!("Export failed: {e}");
                }
                let _ = done_tx.send(result);
            })?;

        Ok(Self {
            output,
            cancel,
            done_rx,
            thread: Some(handle),
        })
    }

    /// Reverse-export `input` into `output` in the background.
    pub fn reverse(input: &Path, output: &Path, settings: &PlayerSettings) -> std::io::Result<Self> {
        let input = input.to_path_buf();
        let target = output.to_path_buf();
        let settings = settings.clone();
        Self::spawn(output.to_path_buf(), move |cancel| {
            run_reverse_export(&input, &target, &settings, cancel)
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Non-blocking check for completion. Returns the result exactly once.
    pub fn poll(&mut self) -> Option<Result<ExportReport, ExportError>> {
        self.thread.as_ref()?;
        let result = match self.done_rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(ExportError::Aborted),
        };
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        Some(result)
    }

    /// Ask the job to stop and wait for it.
    pub fn cancel(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ExportTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::media::decoder::PreloadedVideo;
    use crate::media::test_support::{GappyVideo, solid_frames, test_meta};
    use crate::media::types::DecodedFrame;

    /// Records the first byte (the source frame index) of each written frame.
    #[derive(Default)]
    struct RecordingWriter {
        written: Vec<u8>,
        finished: bool,
        fail_after: Option<usize>,
    }

    impl VideoWriter for RecordingWriter {
        fn write_frame(&mut self, frame: &DecodedFrame) -> Result<(), MediaError> {
            if self.fail_after == Some(self.written.len()) {
                return Err(MediaError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "encoder went away",
                )));
            }
            self.written.push(frame.data[0]);
            Ok(())
        }

        fn finish(&mut self) -> Result<(), MediaError> {
            self.finished = true;
            Ok(())
        }
    }

    fn not_cancelled() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn output_path_replaces_extension() {
        assert_eq!(
            reverse_output_path(Path::new("clips/intro.mp4"), "_revers.avi"),
            PathBuf::from("clips/intro_revers.avi")
        );
        assert_eq!(
            reverse_output_path(Path::new("a.b.mkv"), "_revers.avi"),
            PathBuf::from("a.b_revers.avi")
        );
    }

    #[test]
    fn output_path_ignores_dots_in_directories() {
        assert_eq!(
            reverse_output_path(Path::new("./my.videos/clip"), "_revers.avi"),
            PathBuf::from("./my.videos/clip_revers.avi")
        );
    }

    #[test]
    fn writes_frames_last_to_first() {
        let mut source = PreloadedVideo::from_frames(test_meta(5, 5.0), solid_frames(5));
        let mut writer = RecordingWriter::default();
        let report = export_reverse(&mut source, &mut writer, &not_cancelled()).unwrap();

        assert_eq!(writer.written, vec![4, 3, 2, 1, 0]);
        assert!(writer.finished);
        assert_eq!(
            report,
            ExportReport {
                total_frames: 5,
                written: 5,
                skipped: 0
            }
        );
    }

    #[test]
    fn unreadable_frames_are_skipped_and_counted() {
        let mut source = GappyVideo::new(6, 5.0, &[0, 3]);
        let mut writer = RecordingWriter::default();
        let report = export_reverse(&mut source, &mut writer, &not_cancelled()).unwrap();

        assert_eq!(writer.written, vec![5, 4, 2, 1]);
        assert_eq!(report.written, 4);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn empty_source_produces_finished_empty_output() {
        let mut source = PreloadedVideo::from_frames(test_meta(0, 5.0), Vec::new());
        let mut writer = RecordingWriter::default();
        let report = export_reverse(&mut source, &mut writer, &not_cancelled()).unwrap();

        assert!(writer.written.is_empty());
        assert!(writer.finished);
        assert_eq!(report.written, 0);
    }

    #[test]
    fn write_failure_is_surfaced() {
        let mut source = PreloadedVideo::from_frames(test_meta(5, 5.0), solid_frames(5));
        let mut writer = RecordingWriter {
            fail_after: Some(2),
            ..RecordingWriter::default()
        };
        let err = export_reverse(&mut source, &mut writer, &not_cancelled()).unwrap_err();
        assert!(matches!(err, ExportError::Write { index: 2, .. }));
    }

    #[test]
    fn cancelled_export_still_closes_output() {
        let mut source = PreloadedVideo::from_frames(test_meta(5, 5.0), solid_frames(5));
        let mut writer = RecordingWriter::default();
        let err = export_reverse(&mut source, &mut writer, &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, ExportError::Cancelled { written: 0 }));
        assert!(writer.finished);
    }

    #[test]
    fn missing_input_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_reverse_export(
            &dir.path().join("missing.mp4"),
            &dir.path().join("missing_revers.avi"),
            &PlayerSettings::default(),
            &not_cancelled(),
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::Open(_)));
    }

    fn wait_for(task: &mut ExportTask) -> Result<ExportReport, ExportError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = task.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "export task never finished");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn task_reports_completion_once() {
        let mut task = ExportTask::spawn(PathBuf::from("out_revers.avi"), |cancel| {
            let mut source = PreloadedVideo::from_frames(test_meta(3, 5.0), solid_frames(3));
            let mut writer = RecordingWriter::default();
            export_reverse(&mut source, &mut writer, cancel)
        })
        .unwrap();

        let report = wait_for(&mut task).unwrap();
        assert_eq!(report.written, 3);
        assert!(task.poll().is_none());
        assert_eq!(task.output(), Path::new("out_revers.avi"));
    }

    #[test]
    fn task_cancel_stops_job() {
        let mut task = ExportTask::spawn(PathBuf::from("out.avi"), |cancel| {
            while !cancel.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(1));
            }
            Err(ExportError::Cancelled { written: 0 })
        })
        .unwrap();

        assert!(task.thread.is_some());
        task.cancel();
        assert!(task.thread.is_none());
        assert!(task.poll().is_none());
    }

    #[test]
    fn task_surfaces_failure() {
        let mut task = ExportTask::spawn(PathBuf::from("out.avi"), |_| {
            Err(ExportError::Finish(MediaError::Encoder("boom".into())))
        })
        .unwrap();
        assert!(matches!(wait_for(&mut task), Err(ExportError::Finish(_))));
    }
}
