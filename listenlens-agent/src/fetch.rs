use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use listenlens_core::{
    LensError, Message, QueryTool, RetryPolicy, StructuredGenerator, StructuredRequest, ToolError,
    ToolSpec, Value,
};

use crate::prompts;
use crate::registry::ToolRegistry;
use crate::state::{ErrorKind, FetchResult, FetchStatus, PlannedCall};

const TRUNCATION_MARKER: &str = "... [truncated]";

/// Outcome of one fetch stage: exactly one result per planned call,
/// recoverable errors for the trace, and whether the turn was cancelled
/// mid-stage.
pub struct FetchOutcome {
    pub results: Vec<FetchResult>,
    pub errors: Vec<(ErrorKind, String)>,
    pub cancelled: bool,
}

/// Executes a tool plan: resolves concrete arguments, dispatches all
/// calls concurrently, and applies the retry/timeout/truncation policy.
/// One call's failure never aborts its siblings.
pub struct DataFetchExecutor {
    model: String,
    retry: RetryPolicy,
    aggregate_timeout: Duration,
    truncation_budget: usize,
}

impl DataFetchExecutor {
    pub fn new(
        model: String,
        retry: RetryPolicy,
        aggregate_timeout: Duration,
        truncation_budget: usize,
    ) -> Self {
        Self {
            model,
            retry,
            aggregate_timeout,
            truncation_budget,
        }
    }

    pub async fn execute(
        &self,
        generator: &Arc<dyn StructuredGenerator>,
        registry: &ToolRegistry,
        plan: &[PlannedCall],
        user_query: &str,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let mut results: Vec<Option<FetchResult>> = vec![None; plan.len()];
        let mut errors: Vec<(ErrorKind, String)> = Vec::new();
        let mut join_set: JoinSet<(usize, FetchResult, Option<(ErrorKind, String)>)> =
            JoinSet::new();
        // Task id to slot index, so a worker that dies with a JoinError
        // still lands in its own slot.
        let mut slots_by_task: HashMap<tokio::task::Id, usize> = HashMap::new();

        for (index, call) in plan.iter().enumerate() {
            let Some(tool) = registry.get(&call.name) else {
                // Plans are validated against the registry, so this only
                // fires for stale state replayed across registry changes.
                results[index] = Some(FetchResult {
                    tool_name: call.name.clone(),
                    status: FetchStatus::Failed,
                    payload: String::new(),
                    truncated: false,
                });
                errors.push((
                    ErrorKind::ArgumentResolution,
                    format!("unknown tool '{}'", call.name),
                ));
                continue;
            };

            let worker = CallWorker {
                index,
                call: call.clone(),
                tool,
                generator: Arc::clone(generator),
                model: self.model.clone(),
                retry: self.retry.clone(),
                truncation_budget: self.truncation_budget,
                user_query: user_query.to_string(),
            };
            let handle = join_set.spawn(worker.run());
            slots_by_task.insert(handle.id(), index);
        }

        let deadline = tokio::time::Instant::now() + self.aggregate_timeout;
        let mut cancelled = false;
        while !join_set.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!("aggregate fetch timeout expired with calls outstanding");
                    break;
                }
                joined = join_set.join_next() => {
                    match joined {
                        Some(Ok((index, result, error))) => {
                            results[index] = Some(result);
                            if let Some(error) = error {
                                errors.push(error);
                            }
                        }
                        Some(Err(join_error)) => {
                            if let Some(&index) = slots_by_task.get(&join_error.id()) {
                                results[index] = Some(FetchResult {
                                    tool_name: plan[index].name.clone(),
                                    status: FetchStatus::Failed,
                                    payload: String::new(),
                                    truncated: false,
                                });
                            }
                            errors.push((
                                ErrorKind::ToolExecution,
                                format!("fetch task aborted: {join_error}"),
                            ));
                        }
                        None => break,
                    }
                }
            }
        }
        join_set.abort_all();

        // Calls that lost the race against the aggregate deadline (or a
        // cancellation) terminate as timed out; the stage never blocks.
        let results = plan
            .iter()
            .zip(results)
            .map(|(call, slot)| {
                slot.unwrap_or_else(|| {
                    if !cancelled {
                        errors.push((
                            ErrorKind::Timeout,
                            format!("'{}' cancelled by aggregate timeout", call.name),
                        ));
                    }
                    FetchResult {
                        tool_name: call.name.clone(),
                        status: FetchStatus::TimedOut,
                        payload: String::new(),
                        truncated: false,
                    }
                })
            })
            .collect();

        FetchOutcome {
            results,
            errors,
            cancelled,
        }
    }
}

/// All owned inputs for one concurrent call; writes only its own slot.
struct CallWorker {
    index: usize,
    call: PlannedCall,
    tool: Arc<dyn QueryTool>,
    generator: Arc<dyn StructuredGenerator>,
    model: String,
    retry: RetryPolicy,
    truncation_budget: usize,
    user_query: String,
}

impl CallWorker {
    async fn run(self) -> (usize, FetchResult, Option<(ErrorKind, String)>) {
        let tool_name = self.call.name.clone();

        let args = match self.resolve_args().await {
            Ok(args) => args,
            Err(reason) => {
                tracing::warn!(tool = %tool_name, %reason, "argument resolution failed");
                return (
                    self.index,
                    FetchResult {
                        tool_name,
                        status: FetchStatus::Failed,
                        payload: String::new(),
                        truncated: false,
                    },
                    Some((ErrorKind::ArgumentResolution, reason)),
                );
            }
        };

        let invocation = self
            .retry
            .run(&tool_name, || {
                let tool = Arc::clone(&self.tool);
                let name = self.call.name.clone();
                let args = args.clone();
                async move {
                    tool.invoke(args).await.map_err(|err| match err {
                        // Schema rejection is final; retrying the same
                        // arguments cannot help.
                        ToolError::InvalidArgs(reason) => {
                            LensError::Custom(format!("invalid arguments: {reason}"))
                        }
                        other => LensError::ToolCallFailed {
                            tool_name: name,
                            reason: other.to_string(),
                        },
                    })
                }
            })
            .await;

        let (result, error) = match invocation {
            Ok(value) => {
                let serialized = value.to_string();
                let (payload, truncated) = truncate_payload(serialized, self.truncation_budget);
                if truncated {
                    tracing::debug!(tool = %tool_name, "payload truncated to budget");
                }
                (
                    FetchResult {
                        tool_name,
                        status: FetchStatus::Ok,
                        payload,
                        truncated,
                    },
                    None,
                )
            }
            Err(LensError::Timeout(duration)) => (
                FetchResult {
                    tool_name: tool_name.clone(),
                    status: FetchStatus::TimedOut,
                    payload: String::new(),
                    truncated: false,
                },
                Some((
                    ErrorKind::Timeout,
                    format!("'{tool_name}' timed out after {duration:?}"),
                )),
            ),
            Err(err @ LensError::Custom(_)) => (
                FetchResult {
                    tool_name: tool_name.clone(),
                    status: FetchStatus::Failed,
                    payload: String::new(),
                    truncated: false,
                },
                Some((ErrorKind::ArgumentResolution, err.to_string())),
            ),
            Err(err) => (
                FetchResult {
                    tool_name: tool_name.clone(),
                    status: FetchStatus::Failed,
                    payload: String::new(),
                    truncated: false,
                },
                Some((ErrorKind::ToolExecution, err.to_string())),
            ),
        };

        (self.index, result, error)
    }

    /// An object hint that validates as complete against the tool's
    /// declared schema is used as-is; anything else goes through one
    /// structured-generation round against that schema.
    async fn resolve_args(&self) -> Result<Value, String> {
        let spec = ToolSpec::of(self.tool.as_ref());
        if args_complete(&self.call.raw_args, &spec.parameters) {
            return Ok(self.call.raw_args.clone());
        }

        let now = chrono::Local::now().naive_local();
        let mut messages = vec![Message::system(prompts::argument_resolution_system(
            &spec,
            &self.call.reasoning,
            now,
        ))];
        if !self.call.raw_args.is_null() {
            messages.push(Message::assistant(format!(
                "Argument hints from the planner: {}",
                self.call.raw_args
            )));
        }
        messages.push(Message::user(self.user_query.clone()));

        self.retry
            .run("resolve_args", || {
                let generator = Arc::clone(&self.generator);
                let request = StructuredRequest {
                    model: self.model.clone(),
                    messages: messages.clone(),
                    schema: spec.parameters.clone(),
                };
                async move { generator.generate_structured(request).await }
            })
            .await
            .map_err(|err| err.to_string())
    }
}

/// An argument object is complete when every provided key is declared
/// by the schema and every required key is provided. An undeclared key
/// means the planner left a hint (a relative date, a free-form range)
/// that still needs resolving, not a finished argument set.
fn args_complete(raw: &Value, schema: &Value) -> bool {
    let Some(args) = raw.as_object() else {
        return false;
    };
    let properties = match schema.get("properties").and_then(Value::as_object) {
        Some(properties) => properties,
        None => return args.is_empty(),
    };
    if !args.keys().all(|key| properties.contains_key(key)) {
        return false;
    }
    match schema.get("required").and_then(Value::as_array) {
        Some(required) => required
            .iter()
            .filter_map(Value::as_str)
            .all(|key| args.contains_key(key)),
        None => true,
    }
}

/// Deterministic lossy cut to the byte budget. Tool payloads order rows
/// most-relevant/most-recent first, so a prefix cut keeps the rows that
/// matter.
fn truncate_payload(serialized: String, budget: usize) -> (String, bool) {
    if serialized.len() <= budget {
        return (serialized, false);
    }

    let mut cut = budget.saturating_sub(TRUNCATION_MARKER.len());
    while cut > 0 && !serialized.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut payload = serialized[..cut].to_string();
    payload.push_str(TRUNCATION_MARKER);
    if payload.len() > budget {
        payload.truncate(budget);
    }
    (payload, true)
}
