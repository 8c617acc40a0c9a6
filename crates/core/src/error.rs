//! Error types for the Dossier domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Fault`] names the
//! orchestration-level failures that route a run to fallback assembly.

use thiserror::Error;

/// Errors raised while wiring a report service from configuration.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model backend errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),
}

// --- Bounded context errors ---

/// Failures talking to the text-generation backend (the "backend fault").
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),
}

/// A single tool invocation failed (the "tool execution fault").
///
/// Never escalates past the dispatcher: it is recorded as an error-tagged
/// tool result and the loop continues.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Failures of the retrieval collaborator.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Knowledge source not ready: {0}")]
    NotReady(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),
}

/// Orchestration-level faults. None of these reach the caller: each one
/// degrades to fallback assembly and is reported alongside the document.
#[derive(Debug, Clone, Error)]
pub enum Fault {
    #[error("Backend fault: {0}")]
    Backend(ProviderError),

    #[error("Malformed final output: {0}")]
    MalformedFinalOutput(String),

    #[error("Iteration cap of {cap} round-trips reached without a final answer")]
    Exhaustion { cap: u32 },

    #[error("Run cancelled")]
    Cancelled,
}
