//! ModelClient trait: the abstraction over text-generation backends.
//!
//! A ModelClient knows how to send a transcript to a model and get back one
//! [`ModelTurn`]: either a final answer or a list of tool requests.
//!
//! Implementations: OpenAI-compatible endpoints (Ollama, OpenAI, OpenRouter,
//! vLLM, ...). The client owns its model name, sampling settings and the
//! advertised tool definitions; the orchestration loop only hands it the
//! transcript.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{ModelTurn, Transcript};

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The core ModelClient trait.
///
/// Backend failures (unreachable, rejected, undecodable) are returned as
/// `Err` and never folded into an answer. Implementations need not be
/// deterministic and must not be assumed to return promptly: callers wrap
/// `send` in a timeout.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "ollama").
    fn name(&self) -> &str;

    /// Send the transcript and get the model's next turn.
    async fn send(&self, transcript: &Transcript) -> Result<ModelTurn, ProviderError>;

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "extract_exact_text".into(),
            description: "Extract verbatim section text".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "section_title": { "type": "string" }
                },
                "required": ["section_title"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("extract_exact_text"));
        assert!(json.contains("section_title"));
    }

    struct Silent;

    #[async_trait]
    impl ModelClient for Silent {
        fn name(&self) -> &str { "silent" }
        async fn send(&self, _transcript: &Transcript) -> Result<ModelTurn, ProviderError> {
            Ok(ModelTurn::answer(""))
        }
    }

    #[tokio::test]
    async fn default_health_check_is_ok() {
        assert!(Silent.health_check().await.unwrap());
    }
}
