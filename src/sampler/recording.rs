use std::time::Duration;

use tokio::time::Instant;

use super::encode_jpeg;
use crate::{capture::RawFrame, error::RecordingError};

#[derive(Debug, Clone)]
pub struct RecordingChunk {
    /// Time since the window opened.
    pub offset: Duration,
    pub jpeg: Vec<u8>,
}

/// Motion-JPEG recording of one sampling window.
#[derive(Debug, Clone, Default)]
pub struct RawRecording {
    pub chunks: Vec<RecordingChunk>,
    pub duration: Duration,
    pub frames_emitted: u32,
    pub cancelled: bool,
}

impl RawRecording {
    pub(crate) fn cancelled_before_start() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.jpeg.len()).sum()
    }

    /// Concatenated JPEG chunks, playable as an MJPEG stream.
    pub fn to_mjpeg(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.jpeg);
        }
        out
    }
}

/// Accumulates recording chunks, keeping at most `fps` per second.
pub(super) struct Recorder {
    started: Instant,
    min_gap: Option<Duration>,
    quality: u8,
    last_chunk_at: Option<Instant>,
    last_sequence: Option<u64>,
    chunks: Vec<RecordingChunk>,
}

impl Recorder {
    pub(super) fn new(started: Instant, fps: u32, quality: u8) -> Self {
        let min_gap = (fps > 0).then(|| Duration::from_secs(1) / fps);
        Self {
            started,
            min_gap,
            quality,
            last_chunk_at: None,
            last_sequence: None,
            chunks: Vec::new(),
        }
    }

    pub(super) fn offer(&mut self, frame: &RawFrame, now: Instant) -> Result<(), RecordingError> {
        let Some(min_gap) = self.min_gap else {
            return Ok(());
        };
        if self.last_sequence == Some(frame.sequence) {
            return Ok(());
        }
        if let Some(last) = self.last_chunk_at {
            if now.duration_since(last) < min_gap {
                return Ok(());
            }
        }

        let jpeg = encode_jpeg(&frame.image, self.quality)?;
        self.chunks.push(RecordingChunk {
            offset: now.duration_since(self.started),
            jpeg,
        });
        self.last_chunk_at = Some(now);
        self.last_sequence = Some(frame.sequence);
        Ok(())
    }

    pub(super) fn finish(self, now: Instant, frames_emitted: u32, cancelled: bool) -> RawRecording {
        RawRecording {
            chunks: self.chunks,
            duration: now.duration_since(self.started),
            frames_emitted,
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::solid_image;

    fn raw(sequence: u64) -> RawFrame {
        RawFrame {
            image: Arc::new(solid_image(4, 4, 100)),
            sequence,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recorder_throttles_to_fps() {
        let start = Instant::now();
        let mut recorder = Recorder::new(start, 10, 80);

        for i in 0..40u64 {
            let now = start + Duration::from_millis(i * 25);
            recorder.offer(&raw(i + 1), now).unwrap();
        }
        let recording = recorder.finish(start + Duration::from_secs(1), 1, false);

        // 40 frames over 1s, one chunk kept every 100ms.
        assert_eq!(recording.chunks.len(), 10);
        assert_eq!(recording.chunks[1].offset, Duration::from_millis(100));
        assert_eq!(recording.duration, Duration::from_secs(1));
        assert_eq!(recording.to_mjpeg().len(), recording.byte_len());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_frame_is_not_recorded_twice() {
        let start = Instant::now();
        let mut recorder = Recorder::new(start, 10, 80);
        recorder.offer(&raw(1), start).unwrap();
        recorder
            .offer(&raw(1), start + Duration::from_millis(500))
            .unwrap();

        assert_eq!(recorder.finish(start, 0, false).chunks.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_fps_disables_recording() {
        let start = Instant::now();
        let mut recorder = Recorder::new(start, 0, 80);
        recorder.offer(&raw(1), start).unwrap();

        assert!(recorder.finish(start, 0, false).is_empty());
    }
}
