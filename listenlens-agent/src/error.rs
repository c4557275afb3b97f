use thiserror::Error;

use listenlens_core::LensError;

use crate::state::AgentState;

/// User-facing text for a fatal pipeline failure. Deliberately generic:
/// a partial or garbled answer is never surfaced.
pub const FAILURE_MESSAGE: &str =
    "Sorry, I can't answer right now because the language service is unreachable. \
     Please try again in a moment.";

/// The pipeline was structurally unable to proceed. Recoverable
/// sub-stage failures never produce this; they live in
/// `fetch_results`/`error_trace` instead.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PipelineFailure {
    /// Final state, `stage == Failed`, no `final_response`.
    pub state: Box<AgentState>,
    /// Generic, safe-to-display message.
    pub message: String,
    #[source]
    pub source: LensError,
}

/// Construction-time misconfiguration, surfaced before any turn runs.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("duplicate tool name '{0}'")]
    DuplicateToolName(String),
    #[error("no structured generator configured")]
    MissingGenerator,
}
