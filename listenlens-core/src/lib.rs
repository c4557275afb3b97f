mod error;
mod generation;
mod message;
mod retry;
mod tool;

pub use error::LensError;
pub use generation::{StructuredGenerator, StructuredRequest, TextRequest};
pub use message::{Message, Role};
pub use retry::{is_retryable, RetryPolicy};
pub use tool::{QueryTool, ToolError, ToolSpec};

pub type Value = serde_json::Value;
