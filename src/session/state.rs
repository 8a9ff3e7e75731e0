use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::result::AnalysisResult;
use crate::sampler::CapturedFrame;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Capturing,
    Finalizing,
    Complete,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub frames_captured: u32,
    pub target_frames: u32,
    pub progress_percent: u8,
    pub result: Option<AnalysisResult>,
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub target_frames: u32,
    pub frames: Vec<CapturedFrame>,
    pub started_at: Option<DateTime<Utc>>,
    pub result: Option<AnalysisResult>,
    /// Fires to cancel the in-flight capture, including while the model loads.
    pub cancel_token: Option<CancellationToken>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_start(&self) -> bool {
        matches!(self.status, SessionStatus::Idle | SessionStatus::Complete)
    }

    /// Enters `Capturing`, discarding everything from the previous session.
    pub fn begin(&mut self, session_id: String, target_frames: u32, cancel_token: CancellationToken) {
        *self = Self {
            status: SessionStatus::Capturing,
            session_id: Some(session_id),
            target_frames,
            frames: Vec::with_capacity(target_frames as usize),
            started_at: Some(Utc::now()),
            result: None,
            cancel_token: Some(cancel_token),
        };
    }

    pub fn is_current(&self, session_id: &str) -> bool {
        self.session_id.as_deref() == Some(session_id)
    }

    pub fn push_frame(&mut self, frame: CapturedFrame) -> u8 {
        self.frames.push(frame);
        self.progress_percent()
    }

    pub fn frames_captured(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn progress_percent(&self) -> u8 {
        if self.target_frames == 0 {
            return 0;
        }
        let percent = self.frames_captured() as u64 * 100 / self.target_frames as u64;
        percent.min(100) as u8
    }

    pub fn finalize(&mut self) {
        self.status = SessionStatus::Finalizing;
        self.cancel_token = None;
    }

    pub fn complete(&mut self, result: AnalysisResult) {
        self.status = SessionStatus::Complete;
        self.result = Some(result);
        self.cancel_token = None;
    }

    /// Back to `Idle` with nothing retained.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            session_id: self.session_id.clone(),
            frames_captured: self.frames_captured(),
            target_frames: self.target_frames,
            progress_percent: self.progress_percent(),
            result: self.result.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u32) -> CapturedFrame {
        CapturedFrame {
            index,
            jpeg: Vec::new(),
            width: 1,
            height: 1,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn begin_discards_previous_session() {
        let mut state = SessionState::new();
        state.begin("first".into(), 15, CancellationToken::new());
        state.push_frame(frame(1));
        state.finalize();

        assert!(!state.can_start());

        state.status = SessionStatus::Complete;
        assert!(state.can_start());

        state.begin("second".into(), 15, CancellationToken::new());
        assert!(state.is_current("second"));
        assert!(state.frames.is_empty());
        assert!(state.result.is_none());
    }

    #[test]
    fn progress_tracks_frames() {
        let mut state = SessionState::new();
        state.begin("s".into(), 15, CancellationToken::new());

        assert_eq!(state.push_frame(frame(1)), 6);
        for i in 2..=15 {
            state.push_frame(frame(i));
        }
        assert_eq!(state.progress_percent(), 100);
        assert_eq!(state.snapshot().frames_captured, 15);
    }

    #[test]
    fn clear_returns_to_idle() {
        let mut state = SessionState::new();
        state.begin("s".into(), 15, CancellationToken::new());
        state.clear();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert!(snapshot.session_id.is_none());
        assert_eq!(snapshot.target_frames, 0);
    }
}
