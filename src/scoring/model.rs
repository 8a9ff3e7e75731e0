use std::{
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::emotions::{RawScores, EMOTION_COUNT};
use crate::{
    settings::{ModelKind, ModelSettings},
    training::LabeledImage,
};

/// Strategy behind [`super::EmotionScorer`]. `warm_up` and `infer` run on the
/// blocking pool, so implementations may do real work in them.
pub trait EmotionModel: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn warm_up(&self) -> Result<()>;

    fn infer(&self, image: &[u8]) -> Result<RawScores>;

    fn fit(&self, _samples: &[LabeledImage]) -> Result<()> {
        Ok(())
    }
}

pub fn build_model(settings: &ModelSettings) -> Arc<dyn EmotionModel> {
    let load_delay = Duration::from_millis(settings.load_delay_ms);
    match settings.kind {
        ModelKind::Random => {
            let model = match settings.seed {
                Some(seed) => RandomEmotionModel::seeded(seed),
                None => RandomEmotionModel::new(),
            };
            Arc::new(model.with_load_delay(load_delay))
        }
        ModelKind::Heuristic => Arc::new(ToneHeuristicModel::new().with_load_delay(load_delay)),
    }
}

/// Uniform random scores per class. This is a placeholder for a real
/// classifier and carries no information about the image.
pub struct RandomEmotionModel {
    rng: Mutex<StdRng>,
    load_delay: Duration,
}

impl RandomEmotionModel {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            load_delay: Duration::ZERO,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            load_delay: Duration::ZERO,
        }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }
}

impl Default for RandomEmotionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionModel for RandomEmotionModel {
    fn name(&self) -> &str {
        "random"
    }

    fn warm_up(&self) -> Result<()> {
        if !self.load_delay.is_zero() {
            thread::sleep(self.load_delay);
        }
        Ok(())
    }

    fn infer(&self, _image: &[u8]) -> Result<RawScores> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut scores = [0.0; EMOTION_COUNT];
        for score in scores.iter_mut() {
            *score = rng.gen::<f64>() * 100.0;
        }
        Ok(scores)
    }

    fn fit(&self, samples: &[LabeledImage]) -> Result<()> {
        info!("random model ignores {} training samples", samples.len());
        Ok(())
    }
}

/// Deterministic scores derived from pixel statistics of the decoded frame:
/// brightness, colourfulness, warmth and contrast each push a few classes.
/// Same bytes in, same scores out.
pub struct ToneHeuristicModel {
    load_delay: Duration,
}

impl ToneHeuristicModel {
    pub fn new() -> Self {
        Self {
            load_delay: Duration::ZERO,
        }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }
}

impl Default for ToneHeuristicModel {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
struct ToneStats {
    brightness: f64,
    saturation: f64,
    warmth: f64,
    contrast: f64,
}

fn tone_stats(image: &[u8]) -> Result<ToneStats> {
    let decoded = image::load_from_memory(image)
        .context("failed to decode frame for tone analysis")?
        .to_rgb8();
    let pixel_count = (decoded.width() as usize) * (decoded.height() as usize);
    if pixel_count == 0 {
        return Err(anyhow!("frame has no pixels"));
    }

    let mut luma_sum = 0.0;
    let mut luma_sq_sum = 0.0;
    let mut saturation_sum = 0.0;
    let mut warmth_sum = 0.0;

    for px in decoded.pixels() {
        let [r, g, b] = px.0.map(|c| c as f64 / 255.0);
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        luma_sum += luma;
        luma_sq_sum += luma * luma;
        saturation_sum += if max > 0.0 { (max - min) / max } else { 0.0 };
        warmth_sum += r - b;
    }

    let n = pixel_count as f64;
    let brightness = luma_sum / n;
    let variance = (luma_sq_sum / n - brightness * brightness).max(0.0);

    Ok(ToneStats {
        brightness,
        saturation: saturation_sum / n,
        warmth: ((warmth_sum / n) + 1.0) / 2.0,
        contrast: (variance.sqrt() * 2.0).min(1.0),
    })
}

impl EmotionModel for ToneHeuristicModel {
    fn name(&self) -> &str {
        "tone-heuristic"
    }

    fn warm_up(&self) -> Result<()> {
        if !self.load_delay.is_zero() {
            thread::sleep(self.load_delay);
        }
        Ok(())
    }

    fn infer(&self, image: &[u8]) -> Result<RawScores> {
        let s = tone_stats(image)?;
        let dim = 1.0 - s.brightness;
        let cool = 1.0 - s.warmth;
        let flat = 1.0 - s.contrast;

        // Emotion::ALL order.
        Ok([
            s.brightness * s.warmth * 100.0,
            dim * cool * 60.0,
            s.contrast * s.warmth * s.saturation * 80.0,
            dim * s.contrast * 50.0,
            s.saturation * s.contrast * 70.0,
            cool * s.saturation * 40.0,
            flat * (1.0 - s.saturation) * 100.0,
        ])
    }
}

/// Returns the same raw scores for every frame.
pub struct FixedEmotionModel {
    scores: RawScores,
}

impl FixedEmotionModel {
    pub fn new(scores: RawScores) -> Self {
        Self { scores }
    }
}

impl EmotionModel for FixedEmotionModel {
    fn name(&self) -> &str {
        "fixed"
    }

    fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    fn infer(&self, _image: &[u8]) -> Result<RawScores> {
        Ok(self.scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scoring::EmotionDistribution, test_support::tiny_jpeg};

    #[test]
    fn seeded_random_model_is_reproducible() {
        let a = RandomEmotionModel::seeded(7);
        let b = RandomEmotionModel::seeded(7);
        assert_eq!(a.infer(&[]).unwrap(), b.infer(&[]).unwrap());
        assert!(a.infer(&[]).unwrap().iter().all(|s| (0.0..100.0).contains(s)));
    }

    #[test]
    fn tone_model_is_a_pure_function_of_bytes() {
        let model = ToneHeuristicModel::new();
        let frame = tiny_jpeg(180);
        let first = model.infer(&frame).unwrap();
        let second = model.infer(&frame).unwrap();
        assert_eq!(first, second);

        let normalized = EmotionDistribution::normalize(first);
        assert!((normalized.total() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn tone_model_rejects_undecodable_frames() {
        let model = ToneHeuristicModel::new();
        assert!(model.infer(b"garbage").is_err());
    }

    #[test]
    fn build_model_honours_kind() {
        let settings = ModelSettings {
            kind: ModelKind::Heuristic,
            seed: None,
            load_delay_ms: 0,
            training_step_ms: 0,
        };
        assert_eq!(build_model(&settings).name(), "tone-heuristic");

        let settings = ModelSettings {
            kind: ModelKind::Random,
            seed: Some(1),
            ..settings
        };
        assert_eq!(build_model(&settings).name(), "random");
    }
}
