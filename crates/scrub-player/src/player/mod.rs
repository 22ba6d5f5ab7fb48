pub mod observer;
pub mod scrub;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::media::types::{MediaError, VideoMeta};
use crate::media::{self, VideoSource};
use crate::settings::PlayerSettings;
use observer::PlaybackObserver;

/// Messages handled by the pacing thread, one per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayerCommand {
    Seek(usize),
    /// Re-evaluate the pause flag now instead of at the next deadline.
    Wake,
    Stop,
}

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    pub start_paused: bool,
    /// Decode and show the seek target while paused, without advancing.
    pub preview_on_seek: bool,
    pub stop_timeout: Duration,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            start_paused: false,
            preview_on_seek: true,
            stop_timeout: Duration::from_millis(500),
        }
    }
}

impl PlaybackOptions {
    pub fn from_settings(settings: &PlayerSettings) -> Self {
        Self {
            start_paused: settings.start_paused,
            preview_on_seek: settings.preview_on_seek,
            stop_timeout: Duration::from_millis(settings.stop_timeout_ms),
        }
    }
}

/// Counters published by the pacing thread.
#[derive(Default)]
struct PlaybackStats {
    position: AtomicUsize,
    frames_shown: AtomicU64,
    decode_gaps: AtomicU64,
    at_end: AtomicBool,
}

/// Drives timed frame display from a video source on a background thread.
///
/// The pacing thread owns the cursor. Seeks travel as messages and are
/// applied before the next tick, so an advance can never overwrite a seek.
pub struct PlaybackController {
    commands: Sender<PlayerCommand>,
    paused: Arc<AtomicBool>,
    /// Checked before every iteration and every decode, ahead of queued commands.
    stop_requested: Arc<AtomicBool>,
    stats: Arc<PlaybackStats>,
    meta: VideoMeta,
    thread: Option<JoinHandle<()>>,
    stop_timeout: Duration,
}

impl PlaybackController {
    /// Open `path` and start pacing its frames into `observer`.
    pub fn start(
        path: &Path,
        settings: &PlayerSettings,
        observer: Box<dyn PlaybackObserver>,
    ) -> Result<Self, MediaError> {
        let source = media::open_source(path, settings.decode_mode, settings.max_predecode_secs)?;
        Self::with_source(source, PlaybackOptions::from_settings(settings), observer)
    }

    /// Start pacing an already-open source.
    pub fn with_source(
        source: Box<dyn VideoSource>,
        options: PlaybackOptions,
        observer: Box<dyn PlaybackObserver>,
    ) -> Result<Self, MediaError> {
        let meta = source.meta().clone();
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let paused = Arc::new(AtomicBool::new(options.start_paused));
        let stop_requested = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(PlaybackStats::default());

        let pacing = PacingLoop {
            interval: meta.frame_interval(),
            total_frames: meta.frame_count,
            source,
            observer,
            commands: command_rx,
            paused: paused.clone(),
            stop_requested: stop_requested.clone(),
            stats: stats.clone(),
            cursor: 0,
            preview_on_seek: options.preview_on_seek,
            end_reported: false,
        };

        let handle = thread::Builder::new()
            .name("scrub-player-pacing".into())
            .spawn(move || pacing.run())?;

        log::info!(
            "Playback started: {} frames at {:.3} fps ({} µs/frame){}",
            meta.frame_count,
            meta.fps,
            meta.frame_interval().as_micros(),
            if options.start_paused { ", paused" } else { "" }
        );

        Ok(Self {
            commands,
            paused,
            stop_requested,
            stats,
            meta,
            thread: Some(handle),
            stop_timeout: options.stop_timeout,
        })
    }

    /// Flip the pause flag. Returns the new paused state.
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.paused.fetch_xor(true, Ordering::AcqRel);
        let _ = self.commands.send(PlayerCommand::Wake);
        log::info!("{}", if paused { "Paused" } else { "Playing" });
        paused
    }

    /// Request a jump to `frame`, clamped to the last frame.
    /// Returns the effective target, or `None` for a source without frames.
    pub fn seek(&self, frame: usize) -> Option<usize> {
        let total = self.meta.frame_count;
        if total == 0 {
            log::warn!("Seek to frame {frame} ignored: source has no frames");
            return None;
        }
        let target = if frame >= total {
            log::warn!(
                "Seek to frame {frame} out of range, clamped to {}",
                total - 1
            );
            total - 1
        } else {
            frame
        };
        let _ = self.commands.send(PlayerCommand::Seek(target));
        Some(target)
    }

    /// Signal the pacing thread to exit and wait up to the stop timeout.
    /// Returns false if the thread had to be detached.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.thread.take() else {
            return true;
        };
        self.stop_requested.store(true, Ordering::Release);
        let _ = self.commands.send(PlayerCommand::Stop);

        let deadline = Instant::now() + self.stop_timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                log::warn!(
                    "Pacing thread did not stop within {}ms, detaching",
                    self.stop_timeout.as_millis()
                );
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
        let _ = handle.join();

        log::info!(
            "Playback stopped: {} frames shown, {} decode gap{}",
            self.frames_shown(),
            self.decode_gaps(),
            if self.decode_gaps() == 1 { "" } else { "s" }
        );
        true
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn fps(&self) -> f64 {
        self.meta.fps
    }

    pub fn total_frames(&self) -> usize {
        self.meta.frame_count
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.meta.width, self.meta.height)
    }

    /// Last cursor value the pacing thread displayed or seeked to.
    pub fn position(&self) -> usize {
        self.stats.position.load(Ordering::Acquire)
    }

    pub fn frames_shown(&self) -> u64 {
        self.stats.frames_shown.load(Ordering::Relaxed)
    }

    /// Frames that failed to decode and were skipped.
    pub fn decode_gaps(&self) -> u64 {
        self.stats.decode_gaps.load(Ordering::Relaxed)
    }

    pub fn at_end(&self) -> bool {
        self.stats.at_end.load(Ordering::Acquire)
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PacingLoop {
    source: Box<dyn VideoSource>,
    observer: Box<dyn PlaybackObserver>,
    commands: Receiver<PlayerCommand>,
    paused: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    stats: Arc<PlaybackStats>,
    interval: Duration,
    total_frames: usize,
    cursor: usize,
    preview_on_seek: bool,
    end_reported: bool,
}

impl PacingLoop {
    fn run(mut self) {
        let mut next_tick = Instant::now();
        loop {
            if self.stopping() {
                break;
            }
            let at_end = self.cursor >= self.total_frames;
            if at_end && !self.end_reported {
                self.end_reported = true;
                self.stats.at_end.store(true, Ordering::Release);
                self.observer.end_of_stream();
                log::info!("End of stream after frame {}", self.total_frames.saturating_sub(1));
            }

            // Idle states block until a command arrives instead of polling
            let idle = at_end || self.paused.load(Ordering::Acquire);
            let received = if idle {
                self.commands
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                self.commands.recv_deadline(next_tick)
            };

            match received {
                Ok(PlayerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(PlayerCommand::Seek(index)) => match self.newest_seek(index) {
                    Some(target) => self.apply_seek(target),
                    None => break,
                },
                Ok(PlayerCommand::Wake) => {
                    if idle {
                        next_tick = Instant::now();
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.tick();
                    next_tick += self.interval;
                    let now = Instant::now();
                    if next_tick < now {
                        // Fell behind (slow decode); don't burst to catch up
                        next_tick = now;
                    }
                }
            }
        }
        log::debug!("Pacing loop exited at frame {}", self.cursor);
    }

    fn stopping(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Collapse a burst of queued seeks (a scrub drag) into the last one.
    /// `None` if a stop was queued behind them.
    fn newest_seek(&self, first: usize) -> Option<usize> {
        let mut target = first;
        for command in self.commands.try_iter() {
            match command {
                PlayerCommand::Seek(index) => target = index,
                PlayerCommand::Wake => {}
                PlayerCommand::Stop => return None,
            }
        }
        Some(target)
    }

    fn tick(&mut self) {
        if self.cursor < self.total_frames && !self.paused.load(Ordering::Acquire) {
            self.present(self.cursor);
            self.cursor += 1;
        }
    }

    fn apply_seek(&mut self, index: usize) {
        self.cursor = index.min(self.total_frames.saturating_sub(1));
        self.end_reported = false;
        self.stats.at_end.store(false, Ordering::Release);
        self.stats.position.store(self.cursor, Ordering::Release);

        if self.paused.load(Ordering::Acquire) {
            if self.preview_on_seek {
                self.present(self.cursor);
            } else {
                self.observer.position_changed(self.cursor);
            }
        }
    }

    /// Push the position, decode `index` and hand it to the observer.
    fn present(&mut self, index: usize) {
        if self.stopping() {
            return;
        }
        self.observer.position_changed(index);
        self.stats.position.store(index, Ordering::Release);

        let decoded = self
            .source
            .seek(index)
            .and_then(|()| self.source.read_frame());
        match decoded {
            Ok(Some(image)) => {
                self.observer.frame_ready(index, image);
                self.stats.frames_shown.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {
                self.stats.decode_gaps.fetch_add(1, Ordering::Relaxed);
                log::debug!("Decode gap at frame {index}: stream ended early");
            }
            Err(e) => {
                self.stats.decode_gaps.fetch_add(1, Ordering::Relaxed);
                log::debug!("Decode gap at frame {index}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::decoder::PreloadedVideo;
    use crate::media::test_support::{GappyVideo, SlowVideo, solid_frames, test_meta};
    use observer::{ChannelObserver, PlayerEvent};

    const WAIT: Duration = Duration::from_secs(5);

    fn preloaded(count: usize, fps: f64) -> Box<dyn VideoSource> {
        Box::new(PreloadedVideo::from_frames(test_meta(count, fps), solid_frames(count)))
    }

    fn options(start_paused: bool, preview_on_seek: bool) -> PlaybackOptions {
        PlaybackOptions {
            start_paused,
            preview_on_seek,
            stop_timeout: Duration::from_secs(2),
        }
    }

    fn controller(
        source: Box<dyn VideoSource>,
        options: PlaybackOptions,
    ) -> (PlaybackController, Receiver<PlayerEvent>) {
        let (observer, rx) = ChannelObserver::new(1024);
        let controller =
            PlaybackController::with_source(source, options, Box::new(observer)).unwrap();
        (controller, rx)
    }

    /// Displayed frame indices up to (not including) end of stream.
    fn frames_until_end(rx: &Receiver<PlayerEvent>) -> Vec<usize> {
        let mut shown = Vec::new();
        let deadline = Instant::now() + WAIT;
        loop {
            match rx.recv_deadline(deadline) {
                Ok(PlayerEvent::Frame { index, .. }) => shown.push(index),
                Ok(PlayerEvent::Position(_)) => {}
                Ok(PlayerEvent::EndOfStream) => return shown,
                Err(_) => panic!("no end of stream, shown so far: {shown:?}"),
            }
        }
    }

    fn next_frame(rx: &Receiver<PlayerEvent>) -> usize {
        let deadline = Instant::now() + WAIT;
        loop {
            match rx.recv_deadline(deadline) {
                Ok(PlayerEvent::Frame { index, .. }) => return index,
                Ok(_) => {}
                Err(_) => panic!("no frame displayed"),
            }
        }
    }

    #[test]
    fn reports_source_metadata() {
        let (player, _rx) = controller(preloaded(10, 5.0), options(true, false));
        assert_eq!(player.total_frames(), 10);
        assert!((player.fps() - 5.0).abs() < 1e-9);
        assert_eq!(player.dimensions(), (2, 2));
        assert!(player.thread.as_ref().is_some_and(|h| !h.is_finished()));
    }

    #[test]
    fn start_fails_for_missing_file() {
        let (observer, _rx) = ChannelObserver::new(4);
        let result = PlaybackController::start(
            Path::new("/no/such/video.mp4"),
            &PlayerSettings::default(),
            Box::new(observer),
        );
        assert!(matches!(result, Err(MediaError::OpenFailed { .. })));
    }

    #[test]
    fn start_fails_for_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp4");
        std::fs::write(&path, b"definitely not a video").unwrap();
        let (observer, _rx) = ChannelObserver::new(4);
        let result = PlaybackController::start(&path, &PlayerSettings::default(), Box::new(observer));
        assert!(result.is_err());
    }

    #[test]
    fn plays_every_frame_in_order() {
        let (player, rx) = controller(preloaded(6, 500.0), options(false, false));
        assert_eq!(frames_until_end(&rx), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(player.frames_shown(), 6);
        assert!(player.at_end());
    }

    #[test]
    fn toggle_pause_twice_restores_state() {
        let (player, _rx) = controller(preloaded(10, 5.0), options(false, false));
        assert!(!player.is_paused());
        assert!(player.toggle_pause());
        assert!(!player.toggle_pause());
        assert!(!player.is_paused());
    }

    #[test]
    fn paused_player_displays_nothing() {
        let (player, rx) = controller(preloaded(10, 200.0), options(true, false));
        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());
        assert_eq!(player.frames_shown(), 0);
    }

    #[test]
    fn seek_while_paused_is_displayed_first() {
        let (player, rx) = controller(preloaded(10, 200.0), options(true, false));
        assert_eq!(player.seek(2), Some(2));
        assert_eq!(player.seek(4), Some(4));
        player.toggle_pause();
        assert_eq!(next_frame(&rx), 4);
        assert_eq!(next_frame(&rx), 5);
    }

    #[test]
    fn seek_to_last_frame_then_end_of_stream() {
        // 10 frames at 5 fps: frame 9 shows, index 10 never does
        let (player, rx) = controller(preloaded(10, 5.0), options(true, false));
        assert_eq!(player.seek(9), Some(9));
        player.toggle_pause();
        assert_eq!(frames_until_end(&rx), vec![9]);
        assert_eq!(player.position(), 9);
        assert_eq!(player.frames_shown(), 1);
        assert_eq!(player.decode_gaps(), 0);
    }

    #[test]
    fn preview_on_seek_does_not_advance_cursor() {
        let (player, rx) = controller(preloaded(10, 200.0), options(true, true));
        player.seek(3);
        assert_eq!(next_frame(&rx), 3);
        assert_eq!(player.position(), 3);
        player.toggle_pause();
        assert_eq!(next_frame(&rx), 3);
        assert_eq!(next_frame(&rx), 4);
    }

    #[test]
    fn seek_after_end_restarts_playback() {
        let (player, rx) = controller(preloaded(4, 500.0), options(false, false));
        assert_eq!(frames_until_end(&rx), vec![0, 1, 2, 3]);
        player.seek(2);
        assert_eq!(frames_until_end(&rx), vec![2, 3]);
    }

    #[test]
    fn out_of_range_seek_clamps_to_last_frame() {
        let (player, _rx) = controller(preloaded(10, 5.0), options(true, false));
        assert_eq!(player.seek(25), Some(9));
        assert_eq!(player.seek(10), Some(9));
    }

    #[test]
    fn empty_source_ends_immediately() {
        let (mut player, rx) = controller(preloaded(0, 5.0), options(false, false));
        assert!(frames_until_end(&rx).is_empty());
        assert_eq!(player.seek(0), None);
        assert!(player.stop());
    }

    #[test]
    fn decode_gaps_are_skipped_and_counted() {
        let source = Box::new(GappyVideo::new(5, 500.0, &[1, 3]));
        let (player, rx) = controller(source, options(false, false));
        assert_eq!(frames_until_end(&rx), vec![0, 2, 4]);
        assert_eq!(player.decode_gaps(), 2);
        assert_eq!(player.frames_shown(), 3);
    }

    #[test]
    fn stop_joins_paused_thread() {
        let (mut player, _rx) = controller(preloaded(10, 1.0), options(true, false));
        let started = Instant::now();
        assert!(player.stop());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(player.thread.is_none());
        // Idempotent
        assert!(player.stop());
    }

    #[test]
    fn stop_joins_playing_thread() {
        let (mut player, rx) = controller(preloaded(1000, 1.0), options(false, false));
        assert_eq!(next_frame(&rx), 0);
        assert!(player.stop());
    }

    #[test]
    fn stop_joins_after_seek_burst() {
        let source = Box::new(SlowVideo::new(40, 25.0, Duration::from_millis(50)));
        let (mut player, _rx) = controller(source, options(true, true));
        for frame in 0..40 {
            player.seek(frame);
        }
        let started = Instant::now();
        assert!(player.stop());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(player.frames_shown() < 5);
    }

    #[test]
    fn seek_burst_previews_only_newest_target() {
        let source = Box::new(SlowVideo::new(10, 25.0, Duration::from_millis(30)));
        let (player, rx) = controller(source, options(true, true));
        for frame in 1..10 {
            player.seek(frame);
        }
        let mut shown = vec![next_frame(&rx)];
        while shown.last() != Some(&9) {
            shown.push(next_frame(&rx));
        }
        assert!(shown.len() < 5, "previewed stale targets: {shown:?}");
        assert_eq!(player.position(), 9);
    }
}
