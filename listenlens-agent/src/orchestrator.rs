use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use listenlens_core::{LensError, Message, QueryTool, RetryPolicy, StructuredGenerator};

use crate::analyst::Analyst;
use crate::error::{BuildError, PipelineFailure, FAILURE_MESSAGE};
use crate::fetch::DataFetchExecutor;
use crate::intent::IntentParser;
use crate::registry::ToolRegistry;
use crate::state::{AgentState, ErrorKind, Intent, Stage};

/// The recognized pipeline options. Nothing else is read during
/// execution.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Retries after the first intent-parse attempt.
    pub max_intent_parse_retries: usize,
    /// Total attempts per tool call.
    pub max_tool_call_attempts: usize,
    pub per_call_timeout: Duration,
    pub aggregate_fetch_timeout: Duration,
    pub truncation_byte_budget: usize,
    pub structured_model: String,
    pub synthesis_model: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_intent_parse_retries: 2,
            max_tool_call_attempts: 3,
            per_call_timeout: Duration::from_secs(30),
            aggregate_fetch_timeout: Duration::from_secs(90),
            truncation_byte_budget: 1000,
            structured_model: "structured-default".to_string(),
            synthesis_model: "synthesis-default".to_string(),
        }
    }
}

#[derive(Default)]
pub struct OrchestratorBuilder {
    config: AgentConfig,
    generator: Option<Arc<dyn StructuredGenerator>>,
    tools: Vec<Arc<dyn QueryTool>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn generator(mut self, generator: Arc<dyn StructuredGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn QueryTool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn QueryTool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn build(self) -> Result<Orchestrator, BuildError> {
        let generator = self.generator.ok_or(BuildError::MissingGenerator)?;
        let registry = ToolRegistry::new(self.tools)?;
        Ok(Orchestrator::new(self.config, generator, registry))
    }
}

/// Drives one conversation turn through the stage machine:
/// intent parsing, a pure routing decision, data fetching, and
/// synthesis. Recoverable sub-stage failures are folded into the state;
/// only an unreachable generator fails a turn.
pub struct Orchestrator {
    generator: Arc<dyn StructuredGenerator>,
    registry: ToolRegistry,
    parser: IntentParser,
    fetcher: DataFetchExecutor,
    analyst: Analyst,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    fn new(
        config: AgentConfig,
        generator: Arc<dyn StructuredGenerator>,
        registry: ToolRegistry,
    ) -> Self {
        let generation_retry = RetryPolicy {
            max_attempts: config.max_intent_parse_retries + 1,
            per_call_timeout: config.per_call_timeout,
            ..RetryPolicy::default()
        };
        let tool_retry = RetryPolicy {
            max_attempts: config.max_tool_call_attempts,
            per_call_timeout: config.per_call_timeout,
            ..RetryPolicy::default()
        };

        Self {
            generator,
            registry,
            parser: IntentParser::new(config.structured_model.clone(), generation_retry.clone()),
            fetcher: DataFetchExecutor::new(
                config.structured_model,
                tool_retry,
                config.aggregate_fetch_timeout,
                config.truncation_byte_budget,
            ),
            analyst: Analyst::new(config.synthesis_model, generation_retry),
        }
    }

    /// Run one turn to a terminal stage. Pass the state of the previous
    /// turn to continue a conversation, `None` to start one.
    ///
    /// Recoverable failures never surface here; `Err` means the turn was
    /// structurally unable to produce an answer, with the final state
    /// carried inside the failure.
    pub async fn submit(
        &self,
        prior: Option<AgentState>,
        message: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<AgentState, PipelineFailure> {
        let mut state = match prior {
            Some(prior) => prior.next_turn(message),
            None => AgentState::new(message),
        };
        tracing::info!(conversation = %state.conversation_id, "turn started");

        // One analysis focus per turn, produced by the parser.
        let mut analysis_focus = String::new();

        while !state.stage.is_terminal() {
            if cancel.is_cancelled() {
                state.stage = Stage::Cancelled;
                break;
            }

            match state.stage {
                Stage::IntentParsing => {
                    analysis_focus = self.parse_stage(&mut state, &cancel).await?;
                }
                Stage::DataFetching => self.fetch_stage(&mut state, &cancel).await,
                Stage::Analyzing => {
                    self.analyze_stage(&mut state, &analysis_focus, &cancel)
                        .await?;
                }
                Stage::Done | Stage::Failed | Stage::Cancelled => unreachable!(),
            }
        }

        tracing::info!(conversation = %state.conversation_id, stage = ?state.stage, "turn finished");
        Ok(state)
    }

    async fn parse_stage(
        &self,
        state: &mut AgentState,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineFailure> {
        let outcome = {
            let parse = self
                .parser
                .parse(&self.generator, &self.registry, &state.messages);
            tokio::select! {
                _ = cancel.cancelled() => None,
                outcome = parse => Some(outcome),
            }
        };

        let parsed = match outcome {
            None => {
                state.stage = Stage::Cancelled;
                return Ok(String::new());
            }
            Some(Ok(parsed)) => parsed,
            Some(Err(err)) => return Err(fail(state, err)),
        };

        if let Some(reason) = parsed.degraded {
            state.record_error(ErrorKind::Parse, reason);
            state.degrade_intent();
        } else {
            state.set_intent(parsed.plan.intent);
            state.tool_plan = parsed.plan.tool_plan;
        }

        // ROUTE: a pure decision, not a stage. `other` skips fetching.
        state.stage = if state.intent == Some(Intent::Other) {
            Stage::Analyzing
        } else {
            Stage::DataFetching
        };
        tracing::debug!(intent = ?state.intent, next = ?state.stage, "routed");

        Ok(parsed.plan.reasoning)
    }

    async fn fetch_stage(&self, state: &mut AgentState, cancel: &CancellationToken) {
        let outcome = self
            .fetcher
            .execute(
                &self.generator,
                &self.registry,
                &state.tool_plan,
                &state.user_query,
                cancel,
            )
            .await;

        state.fetch_results = outcome.results;
        for (kind, message) in outcome.errors {
            state.record_error(kind, message);
        }

        let observed: Vec<String> = state
            .fetch_results
            .iter()
            .map(|r| format!("{} ({:?})", r.tool_name, r.status))
            .collect();
        state
            .messages
            .push(Message::tool(format!("fetched: {}", observed.join(", "))));

        state.stage = if outcome.cancelled {
            Stage::Cancelled
        } else {
            Stage::Analyzing
        };
    }

    async fn analyze_stage(
        &self,
        state: &mut AgentState,
        analysis_focus: &str,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineFailure> {
        let intent = state.intent.unwrap_or(Intent::Other);
        let outcome = {
            let synthesis = self.analyst.synthesize(
                &self.generator,
                intent,
                analysis_focus,
                &state.user_query,
                &state.fetch_results,
            );
            tokio::select! {
                _ = cancel.cancelled() => None,
                outcome = synthesis => Some(outcome),
            }
        };

        match outcome {
            None => {
                state.stage = Stage::Cancelled;
                Ok(())
            }
            Some(Ok(text)) => {
                state.messages.push(Message::assistant(text.clone()));
                state.final_response = Some(text);
                state.stage = Stage::Done;
                Ok(())
            }
            Some(Err(err)) => Err(fail(state, err)),
        }
    }
}

/// Seal the state as failed and wrap it with the generic user-facing
/// message. Partial answers are never surfaced for a failed turn.
fn fail(state: &mut AgentState, source: LensError) -> PipelineFailure {
    tracing::error!(%source, "pipeline failed");
    state.record_error(ErrorKind::Fatal, source.to_string());
    state.stage = Stage::Failed;
    state.final_response = None;
    PipelineFailure {
        state: Box::new(state.clone()),
        message: FAILURE_MESSAGE.to_string(),
        source,
    }
}
