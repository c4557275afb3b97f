use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use listenlens_core::{
    LensError, Message, RetryPolicy, StructuredGenerator, StructuredRequest, Value,
};

use crate::prompts;
use crate::registry::ToolRegistry;
use crate::state::{Intent, PlannedCall};

/// The value the planner must produce: an intent plus an ordered tool
/// plan with argument placeholders.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct IntentPlan {
    pub intent: Intent,
    /// Strategic focus; reused by the analyst and as the direct
    /// fallback text for `other`.
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub tool_plan: Vec<PlannedCall>,
}

impl IntentPlan {
    pub fn degraded() -> Self {
        Self {
            intent: Intent::Other,
            reasoning: String::new(),
            tool_plan: Vec::new(),
        }
    }
}

pub struct ParsedIntent {
    pub plan: IntentPlan,
    /// Set when parsing degraded irrecoverably and the plan is the
    /// deterministic `other` fallback.
    pub degraded: Option<String>,
}

/// Classifies a query and proposes a tool plan via one structured
/// generation call, validated against the registry.
pub struct IntentParser {
    model: String,
    retry: RetryPolicy,
}

impl IntentParser {
    pub fn new(model: String, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    pub async fn parse(
        &self,
        generator: &Arc<dyn StructuredGenerator>,
        registry: &ToolRegistry,
        transcript: &[Message],
    ) -> Result<ParsedIntent, LensError> {
        let now = chrono::Local::now().naive_local();
        let mut messages = vec![Message::system(prompts::intent_parser_system(
            registry.specs(),
            now,
        ))];
        messages.extend_from_slice(transcript);

        let schema = serde_json::to_value(schema_for!(IntentPlan))
            .expect("schemars output serializes to JSON");

        let outcome = self
            .retry
            .run("intent_parse", || {
                let request = StructuredRequest {
                    model: self.model.clone(),
                    messages: messages.clone(),
                    schema: schema.clone(),
                };
                async move {
                    let value = generator.generate_structured(request).await?;
                    validate_plan(value, registry)
                }
            })
            .await;

        match outcome {
            Ok(plan) => {
                tracing::info!(intent = ?plan.intent, tools = plan.tool_plan.len(), "intent parsed");
                Ok(ParsedIntent {
                    plan,
                    degraded: None,
                })
            }
            // The one fatal condition: the generator is unreachable.
            Err(err @ LensError::GenerationUnavailable(_)) => Err(err),
            Err(err) => {
                tracing::warn!(%err, "intent parsing degraded to 'other'");
                Ok(ParsedIntent {
                    plan: IntentPlan::degraded(),
                    degraded: Some(err.to_string()),
                })
            }
        }
    }
}

/// A plan is valid when it deserializes, names only registered tools,
/// and its tool plan is empty exactly for the `other` intent.
fn validate_plan(value: Value, registry: &ToolRegistry) -> Result<IntentPlan, LensError> {
    let raw = value.to_string();
    let plan: IntentPlan = serde_json::from_value(value).map_err(|err| {
        LensError::SchemaViolation {
            output: raw.clone(),
            reason: err.to_string(),
        }
    })?;

    for call in &plan.tool_plan {
        if !registry.contains(&call.name) {
            return Err(LensError::SchemaViolation {
                output: raw,
                reason: format!("unknown tool '{}'", call.name),
            });
        }
    }

    let is_other = plan.intent == Intent::Other;
    if is_other != plan.tool_plan.is_empty() {
        return Err(LensError::SchemaViolation {
            output: raw,
            reason: if is_other {
                "intent 'other' must not plan tools".to_string()
            } else {
                "a data intent requires at least one tool".to_string()
            },
        });
    }

    Ok(plan)
}
