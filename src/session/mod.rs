mod controller;
mod result;
mod state;

pub use controller::{SessionController, SessionEvent, StartOutcome};
pub use result::{AnalysisResult, Insights};
pub use state::{SessionSnapshot, SessionState, SessionStatus};
