use serde::{Deserialize, Serialize};

use crate::{LensError, Message, Value};

/// Request for a value conforming to a JSON Schema.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StructuredRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub schema: Value,
}

/// Request for free text from a persona prompt.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TextRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

/// The structured-generation collaborator.
///
/// Every LLM interaction the pipeline needs is one of these two shapes:
/// produce a value matching a schema, or produce free text. Providers sit
/// behind this seam; schema violations surface as
/// [`LensError::SchemaViolation`], transport failures as
/// [`LensError::GenerationUnavailable`].
#[async_trait::async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value, LensError>;

    async fn generate_text(&self, request: TextRequest) -> Result<String, LensError>;
}
