use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EMOTION_COUNT: usize = 7;

/// Un-normalized model output, indexed in [`Emotion::ALL`] order.
pub type RawScores = [f64; EMOTION_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Emotion {
    Happiness,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; EMOTION_COUNT] = [
        Emotion::Happiness,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Surprise,
        Emotion::Disgust,
        Emotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happiness => "happiness",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Neutral => "neutral",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Emotion::Happiness => "Happiness",
            Emotion::Sadness => "Sadness",
            Emotion::Anger => "Anger",
            Emotion::Fear => "Fear",
            Emotion::Surprise => "Surprise",
            Emotion::Disgust => "Disgust",
            Emotion::Neutral => "Neutral",
        }
    }
}

/// Seven-way emotion breakdown in percent.
///
/// Built through [`EmotionDistribution::normalize`], which guarantees the
/// fields are non-negative and sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionDistribution {
    pub happiness: f64,
    pub sadness: f64,
    pub anger: f64,
    pub fear: f64,
    pub surprise: f64,
    pub disgust: f64,
    pub neutral: f64,
}

impl EmotionDistribution {
    /// Scale raw scores so they sum to 100. Negative and non-finite scores
    /// count as zero; an all-zero vector becomes a uniform 100/7 split.
    pub fn normalize(raw: RawScores) -> Self {
        let cleaned = raw.map(|score| if score.is_finite() && score > 0.0 { score } else { 0.0 });
        let total: f64 = cleaned.iter().sum();

        let scaled = if total > 0.0 {
            cleaned.map(|score| score / total * 100.0)
        } else {
            [100.0 / EMOTION_COUNT as f64; EMOTION_COUNT]
        };

        Self::from_ordered(scaled)
    }

    fn from_ordered(values: RawScores) -> Self {
        let [happiness, sadness, anger, fear, surprise, disgust, neutral] = values;
        Self {
            happiness,
            sadness,
            anger,
            fear,
            surprise,
            disgust,
            neutral,
        }
    }

    pub fn get(&self, emotion: Emotion) -> f64 {
        match emotion {
            Emotion::Happiness => self.happiness,
            Emotion::Sadness => self.sadness,
            Emotion::Anger => self.anger,
            Emotion::Fear => self.fear,
            Emotion::Surprise => self.surprise,
            Emotion::Disgust => self.disgust,
            Emotion::Neutral => self.neutral,
        }
    }

    pub fn total(&self) -> f64 {
        Emotion::ALL.iter().map(|emotion| self.get(*emotion)).sum()
    }

    /// Highest-scoring emotion; ties go to the later class in
    /// [`Emotion::ALL`] order.
    pub fn dominant(&self) -> Emotion {
        Emotion::ALL
            .iter()
            .copied()
            .reduce(|best, next| if self.get(best) > self.get(next) { best } else { next })
            .unwrap_or(Emotion::Neutral)
    }

    /// Emotions sorted by descending share.
    pub fn ranked(&self) -> Vec<(Emotion, f64)> {
        let mut ranked: Vec<(Emotion, f64)> = Emotion::ALL
            .iter()
            .map(|emotion| (*emotion, self.get(*emotion)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    pub fn trust_score(&self) -> TrustScore {
        TrustScore::from_distribution(self)
    }
}

/// Integer trust percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TrustScore(u8);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("trust score {0} is outside 0..=100")]
pub struct TrustScoreOutOfRange(pub u8);

impl TryFrom<u8> for TrustScore {
    type Error = TrustScoreOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > 100 {
            return Err(TrustScoreOutOfRange(value));
        }
        Ok(Self(value))
    }
}

impl From<TrustScore> for u8 {
    fn from(score: TrustScore) -> u8 {
        score.0
    }
}

impl TrustScore {
    /// `clamp((positive + neutral*0.5 - negative*1.5) / 2 + 50, 0, 100)`, rounded.
    pub fn from_distribution(emotions: &EmotionDistribution) -> Self {
        let positive = emotions.happiness + emotions.surprise;
        let negative = emotions.anger + emotions.fear + emotions.disgust + emotions.sadness;
        let neutral_weight = emotions.neutral * 0.5;

        let score = (positive + neutral_weight - negative * 1.5) / 2.0 + 50.0;
        Self(score.clamp(0.0, 100.0).round() as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn level(&self) -> TrustLevel {
        TrustLevel::from_score(*self)
    }
}

impl std::fmt::Display for TrustScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrustLevel {
    High,
    Medium,
    Low,
}

impl TrustLevel {
    pub fn from_score(score: TrustScore) -> Self {
        if score.value() >= 70 {
            TrustLevel::High
        } else if score.value() >= 40 {
            TrustLevel::Medium
        } else {
            TrustLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrustLevel::High => "High",
            TrustLevel::Medium => "Medium",
            TrustLevel::Low => "Low",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TrustLevel::High => "Highly trustworthy person",
            TrustLevel::Medium => "Moderate trustworthiness",
            TrustLevel::Low => "Low trustworthiness detected",
        }
    }
}

/// Scores for one analysed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnalysis {
    pub emotions: EmotionDistribution,
    pub trust_score: TrustScore,
}

impl FrameAnalysis {
    pub fn from_distribution(emotions: EmotionDistribution) -> Self {
        Self {
            trust_score: emotions.trust_score(),
            emotions,
        }
    }
}
