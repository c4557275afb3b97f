use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use listenlens_core::{Message, Value};

/// Classified purpose of a user query.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    FactualQuery,
    InsightAnalysis,
    Recommendation,
    Other,
}

/// Pipeline stage. Routing between stages is a pure decision inside the
/// orchestrator, so only observable stages are represented.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    IntentParsing,
    DataFetching,
    Analyzing,
    Done,
    Failed,
    Cancelled,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed | Stage::Cancelled)
    }
}

/// One planned tool call. `raw_args` is whatever the planner proposed:
/// a complete argument object, a fragment, or a free-form hint like
/// "last year" that still needs resolution against the tool's schema.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct PlannedCall {
    pub name: String,
    #[serde(default)]
    pub raw_args: Value,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Ok,
    Failed,
    TimedOut,
}

/// Terminal outcome of one planned tool call. `payload` is the
/// serialized result, cut to the truncation budget when oversized.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct FetchResult {
    pub tool_name: String,
    pub status: FetchStatus,
    pub payload: String,
    pub truncated: bool,
}

impl FetchResult {
    pub fn is_ok(&self) -> bool {
        self.status == FetchStatus::Ok
    }
}

/// Recoverable-error kinds mirrored into `error_trace` for
/// observability. Never load-bearing for control flow.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    ArgumentResolution,
    ToolExecution,
    Timeout,
    Fatal,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ErrorRecord {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

/// The single value threaded through the pipeline. Append-only: stages
/// add fields or advance `stage`, never roll back. Exactly one stage
/// owns the state at a time; ownership moves linearly through the
/// orchestrator's dispatch loop.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AgentState {
    pub conversation_id: Uuid,
    pub user_query: String,
    /// Transcript carried across turns within this process.
    pub messages: Vec<Message>,
    pub intent: Option<Intent>,
    pub tool_plan: Vec<PlannedCall>,
    pub fetch_results: Vec<FetchResult>,
    pub final_response: Option<String>,
    pub stage: Stage,
    pub error_trace: Vec<ErrorRecord>,
}

impl AgentState {
    pub fn new(user_query: impl Into<String>) -> Self {
        let user_query = user_query.into();
        Self {
            conversation_id: Uuid::new_v4(),
            messages: vec![Message::user(user_query.clone())],
            user_query,
            intent: None,
            tool_plan: Vec::new(),
            fetch_results: Vec::new(),
            final_response: None,
            stage: Stage::IntentParsing,
            error_trace: Vec::new(),
        }
    }

    /// Start a fresh turn on an existing conversation: the transcript
    /// survives, everything per-turn resets.
    pub fn next_turn(self, user_query: impl Into<String>) -> Self {
        let user_query = user_query.into();
        let mut messages = self.messages;
        messages.push(Message::user(user_query.clone()));
        Self {
            conversation_id: self.conversation_id,
            messages,
            user_query,
            intent: None,
            tool_plan: Vec::new(),
            fetch_results: Vec::new(),
            final_response: None,
            stage: Stage::IntentParsing,
            error_trace: Vec::new(),
        }
    }

    /// Set the intent exactly once.
    pub(crate) fn set_intent(&mut self, intent: Intent) {
        debug_assert!(self.intent.is_none(), "intent is set exactly once");
        self.intent = Some(intent);
    }

    /// The one permitted downgrade: parsing degraded irrecoverably.
    pub(crate) fn degrade_intent(&mut self) {
        self.intent = Some(Intent::Other);
        self.tool_plan.clear();
    }

    pub(crate) fn record_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.error_trace.push(ErrorRecord {
            stage: self.stage,
            kind,
            message: message.into(),
        });
    }
}
