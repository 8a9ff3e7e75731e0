use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use image::{Rgb, RgbImage};
use log::{debug, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{
    stream::{stream_channel, LiveStream, StreamFeed},
    CaptureSource,
};
use crate::{error::CaptureError, settings::CameraSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    Granted,
    Denied,
    NoDevice,
}

/// Scripted stream failure, for exercising the recording error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticFault {
    /// Publish a failure after this many frames.
    FailAfter(u64),
    /// Stop producing (drop the feed) after this many frames.
    EndAfter(u64),
}

/// Software camera that renders a moving test pattern. Frames are produced by
/// a task on the current tokio runtime.
#[derive(Debug)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    fps: u32,
    permission: Permission,
    fault: Option<SyntheticFault>,
    permission_requests: AtomicUsize,
    active_streams: Arc<AtomicUsize>,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            fps: fps.max(1),
            permission: Permission::Granted,
            fault: None,
            permission_requests: AtomicUsize::new(0),
            active_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self::new(settings.width, settings.height, settings.fps)
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    pub fn with_fault(mut self, fault: SyntheticFault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    /// Streams acquired and not yet released.
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }
}

impl CaptureSource for SyntheticCamera {
    fn label(&self) -> String {
        format!("synthetic {}x{}@{}fps", self.width, self.height, self.fps)
    }

    fn acquire(&self) -> Result<LiveStream, CaptureError> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        match self.permission {
            Permission::Granted => {}
            Permission::Denied => return Err(CaptureError::unavailable("camera permission denied")),
            Permission::NoDevice => return Err(CaptureError::unavailable("no camera present")),
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CaptureError::unavailable("synthetic camera needs a running tokio runtime")
        })?;

        let (feed, frames) = stream_channel();
        let cancel_token = CancellationToken::new();
        let frame_interval = Duration::from_micros(1_000_000 / self.fps as u64);

        runtime.spawn(produce_frames(
            feed,
            cancel_token.clone(),
            (self.width, self.height),
            frame_interval,
            self.fault,
        ));

        let active = Arc::clone(&self.active_streams);
        active.fetch_add(1, Ordering::SeqCst);
        info!("acquired {}", self.label());

        Ok(LiveStream::new(self.label(), frames, move || {
            cancel_token.cancel();
            active.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}

async fn produce_frames(
    mut feed: StreamFeed,
    cancel_token: CancellationToken,
    (width, height): (u32, u32),
    frame_interval: Duration,
    fault: Option<SyntheticFault>,
) {
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("synthetic camera stopped after {} frames", feed.frames_sent());
                break;
            }
            _ = ticker.tick() => {
                match fault {
                    Some(SyntheticFault::FailAfter(n)) if feed.frames_sent() >= n => {
                        warn!("synthetic camera failing after {n} frames");
                        feed.fail("synthetic camera fault");
                        // Keep the feed open so the failure stays the latest state.
                        cancel_token.cancelled().await;
                        break;
                    }
                    Some(SyntheticFault::EndAfter(n)) if feed.frames_sent() >= n => {
                        warn!("synthetic camera ending after {n} frames");
                        break;
                    }
                    _ => {}
                }

                let frame = render_test_pattern(width, height, feed.frames_sent());
                if !feed.push(frame) {
                    break;
                }
            }
        }
    }
}

/// Vertical gradient with a bright bar sweeping left to right, plus a little
/// sensor noise.
fn render_test_pattern(width: u32, height: u32, sequence: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(sequence);
    let bar_x = (sequence * 4 % width as u64) as u32;
    let bar_width = (width / 16).max(1);

    RgbImage::from_fn(width, height, |x, y| {
        let base = (y * 255 / height.max(1)) as u8;
        let noise: u8 = rng.gen_range(0..8);
        if x >= bar_x && x < bar_x + bar_width {
            Rgb([240, 230u8.saturating_add(noise), 200])
        } else {
            Rgb([
                base.saturating_add(noise),
                (base / 2).saturating_add(noise),
                (255 - base).saturating_sub(noise),
            ])
        }
    })
}
