use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use tokio::{sync::broadcast, task::JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    result::AnalysisResult,
    state::{SessionSnapshot, SessionState, SessionStatus},
};
use crate::{
    capture::{CaptureSource, LiveStream},
    error::{CaptureError, SessionError, TrainingError},
    sampler::{sample, CapturedFrame, RawRecording, SamplerConfig, ScheduledTask},
    scoring::{Emotion, EmotionScorer, TrustScore},
    training::{TrainingReport, TrainingSet},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    StateChanged {
        status: SessionStatus,
    },
    FrameCaptured {
        index: u32,
        total: u32,
        progress: u8,
    },
    LiveEmotion {
        index: u32,
        dominant: Emotion,
        trust: TrustScore,
    },
    Completed {
        result: AnalysisResult,
    },
    Cancelled,
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(String),
    /// A session is already capturing or finalizing; nothing changed.
    AlreadyRunning,
    /// `cancel` arrived while the camera and model were being prepared.
    Cancelled,
}

/// Drives one analysis at a time: camera acquisition, model load, the
/// sampling window and finalization.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    source: Arc<dyn CaptureSource>,
    scorer: Arc<EmotionScorer>,
    config: SamplerConfig,
    capture_task: Arc<Mutex<Option<ScheduledTask<()>>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        source: Arc<dyn CaptureSource>,
        scorer: Arc<EmotionScorer>,
        config: SamplerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            source,
            scorer,
            config,
            capture_task: Arc::new(Mutex::new(None)),
            events,
        }
    }

    pub fn scorer(&self) -> &Arc<EmotionScorer> {
        &self.scorer
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock_state().status
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock_state().snapshot()
    }

    /// Starts a new analysis. A completed session is discarded first; a session
    /// that is still running makes this a no-op.
    pub async fn start(&self) -> Result<StartOutcome, SessionError> {
        let cancel_token = CancellationToken::new();
        let session_id = {
            let mut state = self.lock_state();
            if !state.can_start() {
                info!("start ignored, session is {:?}", state.status);
                return Ok(StartOutcome::AlreadyRunning);
            }
            let session_id = Uuid::new_v4().to_string();
            state.begin(
                session_id.clone(),
                self.config.frame_count(),
                cancel_token.clone(),
            );
            session_id
        };
        // Whatever is left in the slot belongs to a finished session.
        drop(self.lock_task().take());
        self.emit(SessionEvent::StateChanged {
            status: SessionStatus::Capturing,
        });
        info!("session {session_id} starting");

        // Opening a device can block for a while; keep it off the runtime.
        let source = Arc::clone(&self.source);
        let acquired = tokio::task::spawn_blocking(move || source.acquire())
            .await
            .unwrap_or_else(|err| {
                Err(CaptureError::unavailable(format!("camera task failed: {err}")))
            });
        let mut stream = match acquired {
            Ok(stream) => stream,
            Err(err) => {
                warn!("session {session_id}: {err}");
                self.abandon(&session_id, SessionEvent::Failed { reason: err.to_string() });
                return Err(err.into());
            }
        };

        let loaded = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => None,
            loaded = self.scorer.load() => Some(loaded.map(|_| ())),
        };
        match loaded {
            None => {
                stream.release();
                info!("session {session_id} cancelled while loading the model");
                self.abandon(&session_id, SessionEvent::Cancelled);
                return Ok(StartOutcome::Cancelled);
            }
            Some(Err(err)) => {
                stream.release();
                warn!("session {session_id}: {err}");
                self.abandon(&session_id, SessionEvent::Failed { reason: err.to_string() });
                return Err(err.into());
            }
            Some(Ok(())) => {}
        }

        let controller = self.clone();
        let id = session_id.clone();
        let task = ScheduledTask::spawn_with_token(cancel_token, move |token| async move {
            controller.run_capture(id, stream, token).await
        });
        *self.lock_task() = Some(task);

        Ok(StartOutcome::Started(session_id))
    }

    /// Stops the capture in progress. Returns false when nothing was capturing.
    pub async fn cancel(&self) -> bool {
        let cancel_token = {
            let state = self.lock_state();
            if state.status != SessionStatus::Capturing {
                return false;
            }
            state.cancel_token.clone()
        };
        if let Some(token) = cancel_token {
            token.cancel();
        }

        let task = self.lock_task().take();
        if let Some(task) = task {
            if let Err(err) = task.cancel_and_join().await {
                warn!("capture task did not shut down cleanly: {err}");
            }
        }
        true
    }

    /// Discards a finished session. Refused while capturing or finalizing.
    pub fn reset(&self) -> bool {
        {
            let mut state = self.lock_state();
            if !state.can_start() {
                return false;
            }
            state.clear();
        }
        drop(self.lock_task().take());
        self.emit(SessionEvent::StateChanged {
            status: SessionStatus::Idle,
        });
        true
    }

    pub async fn train<F>(
        &self,
        set: &TrainingSet,
        on_progress: F,
    ) -> Result<TrainingReport, TrainingError>
    where
        F: FnMut(u8),
    {
        self.scorer.train(set.items(), on_progress).await
    }

    async fn run_capture(
        self,
        session_id: String,
        mut stream: LiveStream,
        cancel_token: CancellationToken,
    ) {
        let total = self.config.frame_count();
        let mut live_feedback = JoinSet::new();

        let outcome = sample(&mut stream, &self.config, &cancel_token, |frame| {
            self.on_frame(&session_id, frame, total, &mut live_feedback)
        })
        .await;

        live_feedback.abort_all();
        stream.release();

        match outcome {
            Ok(recording) if recording.cancelled => {
                log_info!(
                    "session {} cancelled after {} frames",
                    session_id,
                    recording.frames_emitted
                );
                self.abandon(&session_id, SessionEvent::Cancelled);
            }
            Ok(recording) => self.finalize(&session_id, recording).await,
            Err(err) => {
                log_error!("session {} recording failed: {}", session_id, err);
                let err = SessionError::from(err);
                self.abandon(&session_id, SessionEvent::Failed { reason: err.to_string() });
            }
        }
    }

    fn on_frame(
        &self,
        session_id: &str,
        frame: CapturedFrame,
        total: u32,
        live_feedback: &mut JoinSet<()>,
    ) {
        let index = frame.index;
        let progress = {
            let mut state = self.lock_state();
            if !state.is_current(session_id) {
                return;
            }
            state.push_frame(frame.clone())
        };
        self.emit(SessionEvent::FrameCaptured {
            index,
            total,
            progress,
        });

        // Live feedback only; a failure here never fails the session.
        let scorer = Arc::clone(&self.scorer);
        let events = self.events.clone();
        live_feedback.spawn(async move {
            match scorer.analyze_frame(&frame).await {
                Ok(analysis) => {
                    let _ = events.send(SessionEvent::LiveEmotion {
                        index,
                        dominant: analysis.emotions.dominant(),
                        trust: analysis.trust_score,
                    });
                }
                Err(err) => warn!("live analysis of frame {index} failed: {err}"),
            }
        });
    }

    /// Scores the last captured frame and publishes the result.
    async fn finalize(&self, session_id: &str, recording: RawRecording) {
        let last_frame = {
            let mut state = self.lock_state();
            if !state.is_current(session_id) {
                return;
            }
            state.finalize();
            state.frames.last().cloned()
        };
        self.emit(SessionEvent::StateChanged {
            status: SessionStatus::Finalizing,
        });

        let Some(last_frame) = last_frame else {
            let err = SessionError::NoFramesCaptured;
            log_error!("session {} failed: {}", session_id, err);
            self.abandon(session_id, SessionEvent::Failed { reason: err.to_string() });
            return;
        };

        let analysis = match self.scorer.analyze_frame(&last_frame).await {
            Ok(analysis) => analysis,
            Err(err) => {
                log_error!("session {} final analysis failed: {}", session_id, err);
                let err = SessionError::from(err);
                self.abandon(session_id, SessionEvent::Failed { reason: err.to_string() });
                return;
            }
        };

        let result = {
            let mut state = self.lock_state();
            if !state.is_current(session_id) {
                return;
            }
            let result = AnalysisResult::new(
                session_id.to_string(),
                analysis,
                state.frames.clone(),
                recording,
                Utc::now(),
            );
            state.complete(result.clone());
            result
        };

        info!(
            "session {session_id} complete: trust {} ({}), dominant {}",
            result.trust_percentage,
            result.trust_level.label(),
            result.emotions.dominant().as_str()
        );
        self.emit(SessionEvent::StateChanged {
            status: SessionStatus::Complete,
        });
        self.emit(SessionEvent::Completed { result });
    }

    /// Drops the session back to `Idle`, then reports why.
    fn abandon(&self, session_id: &str, event: SessionEvent) {
        {
            let mut state = self.lock_state();
            if state.is_current(session_id) {
                state.clear();
            }
        }
        self.emit(event);
        self.emit(SessionEvent::StateChanged {
            status: SessionStatus::Idle,
        });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<ScheduledTask<()>>> {
        self.capture_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
