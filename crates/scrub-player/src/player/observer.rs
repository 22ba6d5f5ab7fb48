use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::media::types::DecodedFrame;

/// Receives playback output from the pacing thread.
pub trait PlaybackObserver: Send {
    /// The cursor is about to display `frame`.
    fn position_changed(&mut self, frame: usize);

    /// A decoded frame is ready for display.
    fn frame_ready(&mut self, frame: usize, image: Arc<DecodedFrame>);

    /// The cursor ran past the last frame.
    fn end_of_stream(&mut self) {}
}

/// Playback output as delivered to the UI thread.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Position(usize),
    Frame { index: usize, image: Arc<DecodedFrame> },
    EndOfStream,
}

/// Forwards observer calls onto a channel the UI drains every redraw.
///
/// Never blocks the pacing thread. When the UI falls behind, new frames
/// are dropped, while positions and end of stream evict the oldest queued
/// event so the UI always learns where playback stopped.
pub struct ChannelObserver {
    tx: Sender<PlayerEvent>,
    rx: Receiver<PlayerEvent>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, Receiver<PlayerEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx, rx: rx.clone() }, rx)
    }

    fn send_evicting(&self, mut event: PlayerEvent) {
        loop {
            match self.tx.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(back)) => {
                    let _ = self.rx.try_recv();
                    event = back;
                }
            }
        }
    }
}

impl PlaybackObserver for ChannelObserver {
    fn position_changed(&mut self, frame: usize) {
        self.send_evicting(PlayerEvent::Position(frame));
    }

    fn frame_ready(&mut self, frame: usize, image: Arc<DecodedFrame>) {
        if self
            .tx
            .try_send(PlayerEvent::Frame { index: frame, image })
            .is_err()
        {
            log::trace!("Display behind, dropped frame {frame}");
        }
    }

    fn end_of_stream(&mut self) {
        self.send_evicting(PlayerEvent::EndOfStream);
    }
}
