pub mod emotions;
pub mod model;
pub mod scorer;

pub use emotions::{
    Emotion, EmotionDistribution, FrameAnalysis, RawScores, TrustLevel, TrustScore,
    TrustScoreOutOfRange, EMOTION_COUNT,
};
pub use model::{
    build_model, EmotionModel, FixedEmotionModel, RandomEmotionModel, ToneHeuristicModel,
};
pub use scorer::{EmotionScorer, ModelInfo};
