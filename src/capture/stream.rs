use std::{fmt, sync::Arc};

use image::RgbImage;
use log::info;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct RawFrame {
    pub image: Arc<RgbImage>,
    pub sequence: u64,
}

#[derive(Debug, Clone)]
pub enum StreamState {
    Starting,
    Live(RawFrame),
    Failed(String),
}

/// Producer half of a live stream. Dropping it ends the stream.
#[derive(Debug)]
pub struct StreamFeed {
    tx: watch::Sender<StreamState>,
    sequence: u64,
}

impl StreamFeed {
    /// Publishes a frame. Returns false once nobody is watching any more.
    pub fn push(&mut self, image: RgbImage) -> bool {
        self.sequence += 1;
        let frame = RawFrame {
            image: Arc::new(image),
            sequence: self.sequence,
        };
        self.tx.send(StreamState::Live(frame)).is_ok()
    }

    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.tx.send(StreamState::Failed(reason.into()));
    }

    pub fn frames_sent(&self) -> u64 {
        self.sequence
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub fn stream_channel() -> (StreamFeed, watch::Receiver<StreamState>) {
    let (tx, rx) = watch::channel(StreamState::Starting);
    (StreamFeed { tx, sequence: 0 }, rx)
}

/// Handle to an acquired camera. Only the latest frame is kept; the sampler
/// reads it on each tick. The underlying tracks stop on [`LiveStream::release`]
/// or on drop, whichever comes first.
pub struct LiveStream {
    label: String,
    frames: watch::Receiver<StreamState>,
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl LiveStream {
    pub fn new(
        label: impl Into<String>,
        frames: watch::Receiver<StreamState>,
        stop: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            frames,
            stop: Some(Box::new(stop)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_released(&self) -> bool {
        self.stop.is_none()
    }

    pub fn release(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
            info!("released camera stream '{}'", self.label);
        }
    }

    pub(crate) fn frames(&mut self) -> &mut watch::Receiver<StreamState> {
        &mut self.frames
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for LiveStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveStream")
            .field("label", &self.label)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn release_is_idempotent() {
        let stops = Arc::new(AtomicUsize::new(0));
        let (_feed, frames) = stream_channel();
        let counter = Arc::clone(&stops);
        let mut stream = LiveStream::new("test", frames, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        stream.release();
        stream.release();
        drop(stream);

        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_stream() {
        let stops = Arc::new(AtomicUsize::new(0));
        let (_feed, frames) = stream_channel();
        let counter = Arc::clone(&stops);
        drop(LiveStream::new("test", frames, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn feed_reports_closed_receivers() {
        let (mut feed, frames) = stream_channel();
        assert!(feed.push(RgbImage::new(2, 2)));
        drop(frames);
        assert!(feed.is_closed());
        assert!(!feed.push(RgbImage::new(2, 2)));
        assert_eq!(feed.frames_sent(), 2);
    }
}
