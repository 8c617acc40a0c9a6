//! Transcript and message domain types.
//!
//! These are the core value objects that flow through a run:
//! Instruction seeds the transcript → model turns request tools → tool
//! results answer them → a final model turn carries the report.
//!
//! The transcript is append-only. Its order encodes causality between a tool
//! request and its result, and the model's output is a function of exactly
//! this history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::document::ContentBlock;

/// Named string arguments of a tool invocation.
pub type ToolArgs = BTreeMap<String, String>;

/// Unique identifier for a transcript (one per orchestration run).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranscriptId(pub String);

impl TranscriptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TranscriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TranscriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A model's request to run one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Unique within the transcript; correlates the result
    pub request_id: String,

    /// Name of the tool to invoke
    pub tool_name: String,

    /// Arguments as named strings
    #[serde(default)]
    pub args: ToolArgs,
}

impl ToolRequest {
    pub fn new(
        request_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: ToolArgs,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            tool_name: tool_name.into(),
            args,
        }
    }

    /// Look up an argument, treating an empty string as absent.
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// What a model round-trip produced. Never both an answer and requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelTurn {
    /// Terminal: the candidate final answer.
    Answer { text: String },

    /// Non-terminal: tools to run before asking again.
    ToolRequests { requests: Vec<ToolRequest> },
}

impl ModelTurn {
    pub fn answer(text: impl Into<String>) -> Self {
        Self::Answer { text: text.into() }
    }

    pub fn tool_requests(requests: Vec<ToolRequest>) -> Self {
        Self::ToolRequests { requests }
    }

    /// Requested tools; empty for an answer.
    pub fn requests(&self) -> &[ToolRequest] {
        match self {
            Self::Answer { .. } => &[],
            Self::ToolRequests { requests } => requests,
        }
    }
}

/// The content of a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ToolPayload {
    /// A genuine textual answer.
    Text(String),

    /// A genuine list of content blocks.
    Blocks(Vec<ContentBlock>),

    /// The invocation failed; carries the failure description.
    Error(String),
}

impl ToolPayload {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The textual form sent back to the model.
    pub fn to_model_text(&self, tool_name: &str) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => serde_json::to_string(blocks)
                .unwrap_or_else(|e| format!("Tool {tool_name} returned unserializable blocks: {e}")),
            Self::Error(reason) => format!("Error executing tool {tool_name}: {reason}"),
        }
    }
}

/// The resolution of one [`ToolRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The request this result answers
    pub request_id: String,

    /// The tool that was invoked
    pub tool_name: String,

    /// The arguments the request was invoked with
    pub args_echo: ToolArgs,

    /// Content or error description
    pub payload: ToolPayload,
}

impl ToolResult {
    pub fn is_error(&self) -> bool {
        self.payload.is_error()
    }
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// The operating procedure plus the caller's request. Always first.
    Instruction { content: String },

    /// Produced by the model client.
    Model(ModelTurn),

    /// Produced by the tool dispatcher.
    ToolResult(ToolResult),
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instruction { content } => f.write_str(content),
            Self::Model(ModelTurn::Answer { text }) => f.write_str(text),
            Self::Model(ModelTurn::ToolRequests { requests }) => {
                let calls: Vec<String> = requests
                    .iter()
                    .map(|r| format!("{}({:?})", r.tool_name, r.args))
                    .collect();
                write!(f, "requested tools: {}", calls.join(", "))
            }
            Self::ToolResult(result) => {
                f.write_str(&result.payload.to_model_text(&result.tool_name))
            }
        }
    }
}

/// The ordered, append-only message history of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    id: TranscriptId,
    created_at: DateTime<Utc>,
    messages: Vec<Message>,
}

impl Transcript {
    /// Start a transcript with its single instruction message.
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            id: TranscriptId::new(),
            created_at: Utc::now(),
            messages: vec![Message::Instruction {
                content: instruction.into(),
            }],
        }
    }

    pub fn id(&self) -> &TranscriptId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn push_model_turn(&mut self, turn: ModelTurn) {
        self.messages.push(Message::Model(turn));
    }

    pub fn push_tool_result(&mut self, result: ToolResult) {
        self.messages.push(Message::ToolResult(result));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Never true: a transcript always holds its instruction.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn instruction(&self) -> Option<&str> {
        match self.messages.first() {
            Some(Message::Instruction { content }) => Some(content),
            _ => None,
        }
    }

    /// Every tool request, in transcript order.
    pub fn tool_requests(&self) -> impl Iterator<Item = &ToolRequest> {
        self.messages.iter().flat_map(|m| match m {
            Message::Model(turn) => turn.requests(),
            _ => &[],
        })
    }

    /// Every tool result, in transcript order.
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.messages.iter().filter_map(|m| match m {
            Message::ToolResult(result) => Some(result),
            _ => None,
        })
    }

    pub fn contains_request_id(&self, request_id: &str) -> bool {
        self.tool_requests().any(|r| r.request_id == request_id)
    }
}
