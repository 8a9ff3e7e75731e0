mod loop_worker;
mod recording;
mod scheduled;

use std::time::Duration;

use chrono::{DateTime, Utc};
use image::{codecs::jpeg::JpegEncoder, ImageError, RgbImage};
use serde::Serialize;

pub use loop_worker::sample;
pub use recording::{RawRecording, RecordingChunk};
pub use scheduled::ScheduledTask;

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub interval: Duration,
    pub total: Duration,
    pub jpeg_quality: u8,
    /// Upper bound on recording chunks per second. Zero disables the recording.
    pub recording_fps: u32,
    pub first_frame_timeout: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1_000),
            total: Duration::from_millis(15_000),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            recording_fps: 10,
            first_frame_timeout: Duration::from_secs(5),
        }
    }
}

impl SamplerConfig {
    /// Number of frame callbacks a full window produces: `floor(total / interval)`.
    pub fn frame_count(&self) -> u32 {
        if self.interval.is_zero() {
            return 0;
        }
        (self.total.as_nanos() / self.interval.as_nanos()) as u32
    }
}

/// One still sampled from the live stream, JPEG-encoded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedFrame {
    /// 1-based position in the session.
    pub index: u32,
    #[serde(skip)]
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

impl CapturedFrame {
    pub fn byte_len(&self) -> usize {
        self.jpeg.len()
    }
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::with_capacity((image.width() * image.height() / 4) as usize);
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(image)?;
    Ok(buf)
}
