//! Agent orchestration pipeline over a listening-history dataset:
//! intent classification, tool-call planning and execution with
//! retry/timeout/truncation discipline, and persona-tailored synthesis.
//!
//! The pipeline is a linear stage machine driven by [`Orchestrator`]:
//! one turn moves an owned [`AgentState`] through intent parsing, an
//! optional data-fetch stage, and synthesis. LLM access goes through
//! the [`listenlens_core::StructuredGenerator`] seam; data access goes
//! through [`listenlens_core::QueryTool`] implementations held in a
//! [`ToolRegistry`].

mod analyst;
mod error;
mod fetch;
mod intent;
mod orchestrator;
mod prompts;
mod registry;
mod state;

pub use analyst::{Analyst, Persona};
pub use error::{BuildError, PipelineFailure, FAILURE_MESSAGE};
pub use fetch::{DataFetchExecutor, FetchOutcome};
pub use intent::{IntentParser, IntentPlan, ParsedIntent};
pub use orchestrator::{AgentConfig, Orchestrator, OrchestratorBuilder};
pub use registry::ToolRegistry;
pub use state::{
    AgentState, ErrorKind, ErrorRecord, FetchResult, FetchStatus, Intent, PlannedCall, Stage,
};
