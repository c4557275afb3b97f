//! Scripted collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use listenlens_core::{
    LensError, QueryTool, StructuredGenerator, StructuredRequest, TextRequest, ToolError, Value,
};

/// Generator that replays a fixed script of responses, one per call.
/// An exhausted script answers as unreachable, which keeps forgotten
/// expectations loud.
pub struct ScriptedGenerator {
    structured: Mutex<VecDeque<Result<Value, LensError>>>,
    text: Mutex<VecDeque<Result<String, LensError>>>,
    pub structured_calls: AtomicUsize,
    pub text_calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            structured: Mutex::new(VecDeque::new()),
            text: Mutex::new(VecDeque::new()),
            structured_calls: AtomicUsize::new(0),
            text_calls: AtomicUsize::new(0),
        }
    }

    pub fn structured_ok(self, value: Value) -> Self {
        self.structured.lock().unwrap().push_back(Ok(value));
        self
    }

    pub fn structured_err(self, error: LensError) -> Self {
        self.structured.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn text_ok(self, text: &str) -> Self {
        self.text.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn text_err(self, error: LensError) -> Self {
        self.text.lock().unwrap().push_back(Err(error));
        self
    }
}

#[async_trait]
impl StructuredGenerator for ScriptedGenerator {
    async fn generate_structured(&self, _request: StructuredRequest) -> Result<Value, LensError> {
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        self.structured
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LensError::GenerationUnavailable(
                    "structured script exhausted".to_string(),
                ))
            })
    }

    async fn generate_text(&self, _request: TextRequest) -> Result<String, LensError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        self.text.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(LensError::GenerationUnavailable(
                "text script exhausted".to_string(),
            ))
        })
    }
}

/// Never answers: stalls for a fixed delay on every call, then reports
/// the service unreachable.
pub struct StallingGenerator {
    delay: Duration,
    pub structured_calls: AtomicUsize,
}

impl StallingGenerator {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            structured_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StructuredGenerator for StallingGenerator {
    async fn generate_structured(&self, _request: StructuredRequest) -> Result<Value, LensError> {
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Err(LensError::GenerationUnavailable("stalled".to_string()))
    }

    async fn generate_text(&self, _request: TextRequest) -> Result<String, LensError> {
        tokio::time::sleep(self.delay).await;
        Err(LensError::GenerationUnavailable("stalled".to_string()))
    }
}

/// Fails the first `fail_times` invocations with a transient error,
/// then succeeds.
pub struct FlakyTool {
    name: &'static str,
    fail_times: usize,
    pub attempts: AtomicUsize,
}

impl FlakyTool {
    pub fn new(name: &'static str, fail_times: usize) -> Self {
        Self {
            name,
            fail_times,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QueryTool for FlakyTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "flaky test tool"
    }
    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn invoke(&self, _args: Value) -> Result<Value, ToolError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_times {
            Err(ToolError::ExecutionFailed("transient outage".to_string()))
        } else {
            Ok(json!({ "rows": [], "attempt": attempt }))
        }
    }
}

/// Succeeds after a fixed delay.
pub struct SlowTool {
    name: &'static str,
    delay: Duration,
}

impl SlowTool {
    pub fn new(name: &'static str, delay: Duration) -> Self {
        Self { name, delay }
    }
}

#[async_trait]
impl QueryTool for SlowTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "slow test tool"
    }
    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn invoke(&self, _args: Value) -> Result<Value, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "rows": ["done"] }))
    }
}

/// Returns a payload of a chosen serialized size.
pub struct BigPayloadTool {
    name: &'static str,
    size: usize,
}

impl BigPayloadTool {
    pub fn new(name: &'static str, size: usize) -> Self {
        Self { name, size }
    }
}

#[async_trait]
impl QueryTool for BigPayloadTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "oversized payload test tool"
    }
    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn invoke(&self, _args: Value) -> Result<Value, ToolError> {
        Ok(Value::String("x".repeat(self.size)))
    }
}

/// Panics on every invocation.
pub struct PanickyTool {
    name: &'static str,
}

impl PanickyTool {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl QueryTool for PanickyTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "panicking test tool"
    }
    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn invoke(&self, _args: Value) -> Result<Value, ToolError> {
        panic!("tool crashed");
    }
}

/// Rejects every invocation as a schema violation, counting attempts.
pub struct RejectingTool {
    name: &'static str,
    pub attempts: AtomicUsize,
}

impl RejectingTool {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QueryTool for RejectingTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "rejecting test tool"
    }
    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn invoke(&self, _args: Value) -> Result<Value, ToolError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ToolError::InvalidArgs("unexpected field".to_string()))
    }
}
