//! # Dossier Core
//!
//! Domain types, traits, and error definitions for the Dossier report
//! orchestrator. Nothing here performs I/O; it defines the domain model that
//! all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping the model backend or retrieval source via configuration
//! - Easy testing with scripted/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod document;
pub mod error;
pub mod event;
pub mod knowledge;
pub mod message;
pub mod model;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use document::{ContentBlock, ReportBuilder, ReportDocument, Section};
pub use error::{Error, Fault, ProviderError, RetrievalError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use knowledge::{AssetStore, Passage, Retrieval};
pub use message::{Message, ModelTurn, ToolArgs, ToolPayload, ToolRequest, ToolResult, Transcript, TranscriptId};
pub use model::{ModelClient, ToolDefinition};
pub use tool::{ParamSpec, ReturnShape, Tool, ToolOutput, ToolRegistry};
