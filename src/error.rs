//! Error taxonomy shared by capture, sampling, scoring and session orchestration.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("camera backend not supported: {0}")]
    Unsupported(String),
}

impl CaptureError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable(reason.into())
    }
}

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("no frame arrived from the camera within {waited:?}")]
    NoSignal { waited: Duration },

    #[error("camera stream ended after {frames_emitted} sampled frames")]
    StreamEnded { frames_emitted: u32 },

    #[error("camera stream failed: {0}")]
    StreamFailed(String),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("emotion model failed to load: {0}")]
    ModelLoad(#[source] anyhow::Error),

    #[error("emotion model is not loaded yet")]
    ModelNotReady,

    #[error("emotion inference failed: {0}")]
    Inference(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("training needs at least {need} labeled images, got {have}")]
    InsufficientData { have: usize, need: usize },

    #[error("training image is not a recognised image format: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("training already in progress")]
    AlreadyTraining,

    #[error("model training failed: {0}")]
    Failed(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Scorer(#[from] ScorerError),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error("no frames were captured during the session")]
    NoFramesCaptured,
}
