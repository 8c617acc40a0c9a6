//! OpenAI-compatible model client.
//!
//! Works with: Ollama, OpenAI, OpenRouter, vLLM, llama.cpp and any
//! endpoint exposing `/v1/chat/completions` with function calling.
//!
//! The client owns the model name, sampling settings and the tool
//! definitions it advertises; each `send` maps the whole transcript to the
//! chat-completions wire format and maps the first choice back to one
//! [`ModelTurn`].

use async_trait::async_trait;
use dossier_core::error::ProviderError;
use dossier_core::message::{Message, ModelTurn, ToolArgs, ToolRequest, Transcript};
use dossier_core::model::{ModelClient, ToolDefinition};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// A model client for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    json_mode: bool,
    tools: Vec<ToolDefinition>,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("json_mode", &self.json_mode)
            .field("tools", &self.tools)
            .field("client", &self.client)
            .finish()
    }
}

impl OpenAiCompatClient {
    /// Create a new client for `model` at `base_url`.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.1,
            max_tokens: None,
            json_mode: false,
            tools: Vec::new(),
            client: http_client(Duration::from_secs(120)),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Ask the backend for a JSON object as the final answer.
    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }

    /// Advertise these tools on every request.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// HTTP-level timeout; the orchestrator applies its own per-call bound.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Convert the transcript to OpenAI API messages.
    fn to_api_messages(transcript: &Transcript) -> Vec<ApiMessage> {
        transcript
            .messages()
            .iter()
            .map(|m| match m {
                Message::Instruction { content } => ApiMessage {
                    role: "user".into(),
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                Message::Model(ModelTurn::Answer { text }) => ApiMessage {
                    role: "assistant".into(),
                    content: Some(text.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                Message::Model(ModelTurn::ToolRequests { requests }) => ApiMessage {
                    role: "assistant".into(),
                    content: None,
                    tool_calls: Some(
                        requests
                            .iter()
                            .map(|r| ApiToolCall {
                                id: r.request_id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: r.tool_name.clone(),
                                    arguments: serde_json::Value::String(
                                        serde_json::to_string(&r.args).unwrap_or_default(),
                                    ),
                                },
                            })
                            .collect(),
                    ),
                    tool_call_id: None,
                },
                Message::ToolResult(result) => ApiMessage {
                    role: "tool".into(),
                    content: Some(result.payload.to_model_text(&result.tool_name)),
                    tool_calls: None,
                    tool_call_id: Some(result.request_id.clone()),
                },
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(&self, transcript: &Transcript) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(transcript),
            "temperature": self.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !self.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&self.tools));
        }

        if self.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Map the first choice of a completion response to a model turn.
fn turn_from_response(api_response: ApiResponse) -> Result<ModelTurn, ProviderError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

    let tool_calls = choice.message.tool_calls.unwrap_or_default();
    if tool_calls.is_empty() {
        return Ok(ModelTurn::answer(choice.message.content.unwrap_or_default()));
    }

    let requests = tool_calls
        .into_iter()
        .map(|tc| {
            let args = parse_arguments(&tc.function.name, tc.function.arguments);
            ToolRequest::new(tc.id.unwrap_or_default(), tc.function.name, args)
        })
        .collect();

    Ok(ModelTurn::tool_requests(requests))
}

/// Tool-call arguments arrive as a JSON-encoded string (OpenAI) or as an
/// object (Ollama). Non-string values are stringified; nulls are dropped.
fn parse_arguments(tool_name: &str, raw: serde_json::Value) -> ToolArgs {
    let value = match raw {
        serde_json::Value::String(s) if s.trim().is_empty() => return ToolArgs::new(),
        serde_json::Value::String(s) => match serde_json::from_str(&s) {
            Ok(v) => v,
            Err(e) => {
                warn!(tool = tool_name, error = %e, "Unparseable tool arguments, using none");
                return ToolArgs::new();
            }
        },
        other => other,
    };

    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some((k, s)),
                other => Some((k, other.to_string())),
            })
            .collect(),
        serde_json::Value::Null => ToolArgs::new(),
        other => {
            warn!(tool = tool_name, arguments = %other, "Tool arguments are not an object, using none");
            ToolArgs::new()
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, transcript: &Transcript) -> Result<ModelTurn, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(transcript);

        debug!(
            client = %self.name,
            model = %self.model,
            messages = transcript.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Backend returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        if let Some(usage) = &api_response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }

        turn_from_response(api_response)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ApiFunction,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
