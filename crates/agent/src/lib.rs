//! The report orchestration loop.
//!
//! A request flows through four stages:
//!
//! 1. **Instruct**: the [`InstructionTemplate`] seeds a fresh transcript
//! 2. **Loop**: the [`Orchestrator`] alternates model calls and tool
//!    batches until the model answers, the round-trip cap is hit, or the
//!    run aborts
//! 3. **Assemble**: the final answer is parsed as a report, or the report
//!    is reconstructed from the tool results
//! 4. **Render**: the document becomes Markdown
//!
//! [`ReportService`] wires the stages together and always returns a
//! document.

pub mod assembler;
pub mod dispatcher;
pub mod instruction;
pub mod orchestrator;
pub mod render;
pub mod service;

#[cfg(test)]
mod test_helpers;

pub use assembler::{
    AssembledReport, AssemblyPath, assemble, parse_final_output, reconstruct_from_transcript,
};
pub use dispatcher::ToolDispatcher;
pub use instruction::InstructionTemplate;
pub use orchestrator::{AbortReason, LoopOutcome, LoopRun, LoopState, Orchestrator};
pub use render::render_markdown;
pub use service::{ReportRun, ReportService};
