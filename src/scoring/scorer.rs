use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::OnceCell;

use super::{
    emotions::{EmotionDistribution, FrameAnalysis},
    model::EmotionModel,
};
use crate::{
    error::{ScorerError, TrainingError},
    sampler::CapturedFrame,
    training::{LabelCounts, LabeledImage, TrainingReport, MIN_TRAINING_SAMPLES},
};

const DEFAULT_TRAINING_STEP: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub loaded_at: DateTime<Utc>,
}

/// Owns one [`EmotionModel`] and gates every inference on a completed load.
pub struct EmotionScorer {
    model: Arc<dyn EmotionModel>,
    ready: OnceCell<ModelInfo>,
    training: AtomicBool,
    training_runs: AtomicU32,
    training_step: Duration,
}

impl EmotionScorer {
    pub fn new(model: Arc<dyn EmotionModel>) -> Self {
        Self {
            model,
            ready: OnceCell::new(),
            training: AtomicBool::new(false),
            training_runs: AtomicU32::new(0),
            training_step: DEFAULT_TRAINING_STEP,
        }
    }

    pub fn with_training_step(mut self, step: Duration) -> Self {
        self.training_step = step;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    pub fn training_runs(&self) -> u32 {
        self.training_runs.load(Ordering::SeqCst)
    }

    /// Warms the model up once. Concurrent callers wait on the same load; a
    /// failed load leaves the scorer unloaded so it can be retried.
    pub async fn load(&self) -> Result<&ModelInfo, ScorerError> {
        self.ready
            .get_or_try_init(|| async {
                let model = Arc::clone(&self.model);
                info!("loading emotion model '{}'", model.name());
                tokio::task::spawn_blocking(move || model.warm_up())
                    .await
                    .map_err(|err| ScorerError::ModelLoad(anyhow!("model warm-up task failed: {err}")))?
                    .map_err(ScorerError::ModelLoad)?;
                info!("emotion model '{}' loaded", self.model.name());
                Ok(ModelInfo {
                    name: self.model.name().to_string(),
                    loaded_at: Utc::now(),
                })
            })
            .await
    }

    pub fn classify(&self, image: &[u8]) -> Result<EmotionDistribution, ScorerError> {
        if !self.is_ready() {
            return Err(ScorerError::ModelNotReady);
        }
        let raw = self.model.infer(image).map_err(ScorerError::Inference)?;
        Ok(EmotionDistribution::normalize(raw))
    }

    pub fn analyze(&self, image: &[u8]) -> Result<FrameAnalysis, ScorerError> {
        self.classify(image).map(FrameAnalysis::from_distribution)
    }

    /// [`Self::analyze`] on the blocking pool.
    pub async fn analyze_frame(
        self: &Arc<Self>,
        frame: &CapturedFrame,
    ) -> Result<FrameAnalysis, ScorerError> {
        if !self.is_ready() {
            return Err(ScorerError::ModelNotReady);
        }
        let scorer = Arc::clone(self);
        let jpeg = frame.jpeg.clone();
        let index = frame.index;

        let analysis = tokio::task::spawn_blocking(move || scorer.analyze(&jpeg))
            .await
            .map_err(|err| ScorerError::Inference(anyhow!("analysis task failed: {err}")))??;
        debug!(
            "frame {index}: dominant {} trust {}",
            analysis.emotions.dominant().as_str(),
            analysis.trust_score
        );
        Ok(analysis)
    }

    /// Runs a training pass over `samples`, reporting progress in steps of 10%.
    /// Fewer than [`MIN_TRAINING_SAMPLES`] is rejected before anything changes.
    pub async fn train<F>(
        &self,
        samples: &[LabeledImage],
        mut on_progress: F,
    ) -> Result<TrainingReport, TrainingError>
    where
        F: FnMut(u8),
    {
        if samples.len() < MIN_TRAINING_SAMPLES {
            return Err(TrainingError::InsufficientData {
                have: samples.len(),
                need: MIN_TRAINING_SAMPLES,
            });
        }
        if self.training.swap(true, Ordering::SeqCst) {
            return Err(TrainingError::AlreadyTraining);
        }
        let _guard = TrainingGuard(&self.training);

        self.run_training(samples, &mut on_progress).await
    }

    async fn run_training<F>(
        &self,
        samples: &[LabeledImage],
        on_progress: &mut F,
    ) -> Result<TrainingReport, TrainingError>
    where
        F: FnMut(u8),
    {
        let counts = LabelCounts::of(samples);
        info!(
            "training '{}' with {} samples ({} trustworthy, {} untrustworthy)",
            self.model.name(),
            samples.len(),
            counts.trustworthy,
            counts.untrustworthy
        );

        for percent in (0..=100u8).step_by(10) {
            tokio::time::sleep(self.training_step).await;
            debug!("training progress: {percent}%");
            on_progress(percent);
        }

        if let Err(err) = self.model.fit(samples) {
            warn!("model training failed: {err:?}");
            return Err(TrainingError::Failed(err));
        }

        let runs = self.training_runs.fetch_add(1, Ordering::SeqCst) + 1;
        info!("model training completed (run {runs})");

        Ok(TrainingReport {
            samples: samples.len(),
            counts,
            completed_at: Utc::now(),
        })
    }
}

/// Clears the training flag however the run ends, including when the
/// `train` future is dropped mid-run.
struct TrainingGuard<'a>(&'a AtomicBool);

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
