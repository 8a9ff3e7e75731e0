use chrono::Utc;
use tokio::{
    sync::watch,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{
    encode_jpeg,
    recording::{RawRecording, Recorder},
    CapturedFrame, SamplerConfig,
};
use crate::{
    capture::{LiveStream, RawFrame, StreamState},
    error::RecordingError,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Samples `stream` every `config.interval` until `config.total` has elapsed,
/// handing each still to `on_frame` and recording the stream in between.
///
/// The window opens on the first live frame. Ticks are anchored to that
/// instant, so a full window yields exactly [`SamplerConfig::frame_count`]
/// callbacks. Cancelling returns the truncated recording with `cancelled` set.
/// The stream is not released here; the caller owns it.
pub async fn sample<F>(
    stream: &mut LiveStream,
    config: &SamplerConfig,
    cancel_token: &CancellationToken,
    mut on_frame: F,
) -> Result<RawRecording, RecordingError>
where
    F: FnMut(CapturedFrame),
{
    let expected = config.frame_count();
    let frames = stream.frames();

    let first = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => {
            log_info!("sampling cancelled before the first frame");
            return Ok(RawRecording::cancelled_before_start());
        }
        waited = time::timeout(config.first_frame_timeout, wait_for_first_frame(frames)) => match waited {
            Ok(first) => first?,
            Err(_) => {
                log_warn!("no frame within {:?}", config.first_frame_timeout);
                return Err(RecordingError::NoSignal {
                    waited: config.first_frame_timeout,
                });
            }
        },
    };

    let started = Instant::now();
    let mut recorder = Recorder::new(started, config.recording_fps, config.jpeg_quality);
    recorder.offer(&first, started)?;
    log_info!(
        "sampling window opened: {} frames every {:?} over {:?}",
        expected,
        config.interval,
        config.total
    );

    let mut ticker = time::interval_at(started + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    let window_end = time::sleep_until(started + config.total);
    tokio::pin!(window_end);

    let mut emitted: u32 = 0;
    let mut cancelled = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("sampling cancelled after {} of {} frames", emitted, expected);
                cancelled = true;
                break;
            }
            _ = ticker.tick(), if emitted < expected => {
                let raw = latest_frame(frames, emitted)?;
                emitted += 1;
                let frame = still_from(&raw, emitted, config.jpeg_quality)?;
                log_debug!("frame {}/{}: {} bytes", emitted, expected, frame.byte_len());
                on_frame(frame);
            }
            _ = &mut window_end, if emitted >= expected => {
                break;
            }
            changed = frames.changed() => {
                if changed.is_err() {
                    return Err(ended_or_failed(frames, emitted));
                }
                let state = frames.borrow_and_update().clone();
                match state {
                    StreamState::Live(raw) => recorder.offer(&raw, Instant::now())?,
                    StreamState::Failed(reason) => {
                        log_warn!("stream failed after {} frames: {}", emitted, reason);
                        return Err(RecordingError::StreamFailed(reason));
                    }
                    StreamState::Starting => {}
                }
            }
        }
    }

    let recording = recorder.finish(Instant::now(), emitted, cancelled);
    log_info!(
        "sampling window closed: {} frames, {} recording chunks ({} bytes)",
        recording.frames_emitted,
        recording.chunks.len(),
        recording.byte_len()
    );
    Ok(recording)
}

async fn wait_for_first_frame(
    frames: &mut watch::Receiver<StreamState>,
) -> Result<RawFrame, RecordingError> {
    loop {
        let state = frames.borrow_and_update().clone();
        match state {
            StreamState::Live(raw) => return Ok(raw),
            StreamState::Failed(reason) => return Err(RecordingError::StreamFailed(reason)),
            StreamState::Starting => {}
        }
        if frames.changed().await.is_err() {
            return Err(ended_or_failed(frames, 0));
        }
    }
}

fn latest_frame(
    frames: &watch::Receiver<StreamState>,
    emitted: u32,
) -> Result<RawFrame, RecordingError> {
    match &*frames.borrow() {
        StreamState::Live(raw) => Ok(raw.clone()),
        StreamState::Failed(reason) => Err(RecordingError::StreamFailed(reason.clone())),
        StreamState::Starting => Err(RecordingError::StreamEnded {
            frames_emitted: emitted,
        }),
    }
}

/// The producer is gone; report its last word if it left one.
fn ended_or_failed(frames: &watch::Receiver<StreamState>, emitted: u32) -> RecordingError {
    match &*frames.borrow() {
        StreamState::Failed(reason) => RecordingError::StreamFailed(reason.clone()),
        _ => {
            log_warn!("stream ended after {} frames", emitted);
            RecordingError::StreamEnded {
                frames_emitted: emitted,
            }
        }
    }
}

fn still_from(raw: &RawFrame, index: u32, quality: u8) -> Result<CapturedFrame, RecordingError> {
    let jpeg = encode_jpeg(&raw.image, quality)?;
    Ok(CapturedFrame {
        index,
        jpeg,
        width: raw.image.width(),
        height: raw.image.height(),
        captured_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::capture::{stream_channel, CaptureSource, SyntheticCamera, SyntheticFault};
    use crate::test_support::solid_image;

    fn camera() -> SyntheticCamera {
        SyntheticCamera::new(16, 12, 30)
    }

    #[tokio::test(start_paused = true)]
    async fn full_window_emits_exactly_frame_count() {
        let camera = camera();
        let mut stream = camera.acquire().unwrap();
        let config = SamplerConfig::default();
        let mut indices = Vec::new();

        let recording = sample(&mut stream, &config, &CancellationToken::new(), |frame| {
            indices.push(frame.index)
        })
        .await
        .unwrap();

        assert_eq!(indices, (1..=15).collect::<Vec<_>>());
        assert_eq!(recording.frames_emitted, 15);
        assert!(!recording.cancelled);
        assert!(!recording.is_empty());
        assert!(recording.duration >= Duration::from_millis(15_000));
    }

    #[tokio::test(start_paused = true)]
    async fn frames_are_spaced_by_interval() {
        let camera = camera();
        let mut stream = camera.acquire().unwrap();
        let config = SamplerConfig {
            total: Duration::from_millis(5_000),
            ..SamplerConfig::default()
        };
        let mut stamps = Vec::new();

        sample(&mut stream, &config, &CancellationToken::new(), |_| {
            stamps.push(Instant::now())
        })
        .await
        .unwrap();

        assert_eq!(stamps.len(), 5);
        for pair in stamps.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(999) && gap <= Duration::from_millis(1_001));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_truncates_callbacks_and_recording() {
        let camera = camera();
        let mut stream = camera.acquire().unwrap();
        let config = SamplerConfig::default();
        let cancel_token = CancellationToken::new();

        let canceller = {
            let token = cancel_token.clone();
            tokio::spawn(async move {
                time::sleep(Duration::from_millis(7_000)).await;
                token.cancel();
            })
        };

        let mut count = 0u32;
        let recording = sample(&mut stream, &config, &cancel_token, |_| count += 1)
            .await
            .unwrap();
        canceller.await.unwrap();

        assert!((6..=7).contains(&count), "got {count} callbacks");
        assert_eq!(recording.frames_emitted, count);
        assert!(recording.cancelled);
        assert!(recording.duration < Duration::from_millis(15_000));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_ending_mid_window_is_an_error() {
        let camera = camera().with_fault(SyntheticFault::EndAfter(90));
        let mut stream = camera.acquire().unwrap();
        let mut count = 0u32;

        let err = sample(
            &mut stream,
            &SamplerConfig::default(),
            &CancellationToken::new(),
            |_| count += 1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RecordingError::StreamEnded { .. }));
        assert!(count < 15);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_failure_mid_window_is_an_error() {
        let camera = camera().with_fault(SyntheticFault::FailAfter(60));
        let mut stream = camera.acquire().unwrap();

        let err = sample(
            &mut stream,
            &SamplerConfig::default(),
            &CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RecordingError::StreamFailed(reason) if reason == "synthetic camera fault"));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_stream_times_out() {
        let (_feed, frames) = stream_channel();
        let mut stream = LiveStream::new("silent", frames, || {});

        let err = sample(
            &mut stream,
            &SamplerConfig::default(),
            &CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RecordingError::NoSignal { waited } if waited == Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn window_shorter_than_interval_emits_nothing() {
        let (mut feed, frames) = stream_channel();
        feed.push(solid_image(4, 4, 50));
        let mut stream = LiveStream::new("still", frames, || {});
        let config = SamplerConfig {
            total: Duration::from_millis(500),
            ..SamplerConfig::default()
        };
        let mut count = 0;

        let recording = sample(&mut stream, &config, &CancellationToken::new(), |_| count += 1)
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(recording.frames_emitted, 0);
        assert_eq!(recording.chunks.len(), 1);
        drop(feed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_first_frame_returns_empty_recording() {
        let (_feed, frames) = stream_channel();
        let mut stream = LiveStream::new("silent", frames, || {});
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        let recording = sample(&mut stream, &SamplerConfig::default(), &cancel_token, |_| {})
            .await
            .unwrap();

        assert!(recording.cancelled);
        assert_eq!(recording.frames_emitted, 0);
    }
}
