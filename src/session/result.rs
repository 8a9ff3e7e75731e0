use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    sampler::{CapturedFrame, RawRecording},
    scoring::{Emotion, EmotionDistribution, FrameAnalysis, TrustLevel, TrustScore},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
}

impl Insights {
    pub fn from_analysis(emotions: &EmotionDistribution, trust: TrustScore) -> Self {
        let trust = trust.value();
        let mut strengths = Vec::new();
        let mut concerns = Vec::new();

        if emotions.get(Emotion::Happiness) > 20.0 {
            strengths.push("High level of happiness detected".to_string());
        }
        if emotions.get(Emotion::Neutral) > 30.0 {
            strengths.push("Neutral, controlled expression".to_string());
        }
        if emotions.get(Emotion::Surprise) > 15.0 {
            strengths.push("Natural, appropriate reactions".to_string());
        }
        if trust > 50 {
            strengths.push("Consistent facial patterns".to_string());
        }

        if emotions.get(Emotion::Anger) > 15.0 {
            concerns.push("Signs of tension detected".to_string());
        }
        if emotions.get(Emotion::Fear) > 20.0 {
            concerns.push("Indicators of nervousness".to_string());
        }
        if emotions.get(Emotion::Sadness) > 25.0 {
            concerns.push("Expressions of worry".to_string());
        }
        if trust < 50 {
            concerns.push("Inconsistent micro-expressions".to_string());
        }

        Self {
            strengths,
            concerns,
        }
    }
}

/// Everything the presentation layer needs once a session completes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub session_id: String,
    pub completed_at: DateTime<Utc>,
    pub trust_percentage: u8,
    pub trust_level: TrustLevel,
    pub emotions: EmotionDistribution,
    pub insights: Insights,
    pub frames: Vec<CapturedFrame>,
    #[serde(skip)]
    pub recording: RawRecording,
}

impl AnalysisResult {
    pub fn new(
        session_id: String,
        analysis: FrameAnalysis,
        frames: Vec<CapturedFrame>,
        recording: RawRecording,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            completed_at,
            trust_percentage: analysis.trust_score.value(),
            trust_level: analysis.trust_score.level(),
            emotions: analysis.emotions,
            insights: Insights::from_analysis(&analysis.emotions, analysis.trust_score),
            frames,
            recording,
        }
    }
}
