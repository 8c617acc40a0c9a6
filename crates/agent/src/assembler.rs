//! Turning a finished run into a [`ReportDocument`].
//!
//! Two pure functions over the same transcript: the primary path parses
//! the model's final answer; the fallback rebuilds sections from the tool
//! results, which never fails.

use dossier_core::document::{ContentBlock, ReportBuilder, ReportDocument};
use dossier_core::error::Fault;
use dossier_core::message::{Message, ToolPayload, ToolRequest, Transcript};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::orchestrator::{LoopOutcome, LoopRun};

/// Which assembly path produced the document.
#[derive(Debug, Clone)]
pub enum AssemblyPath {
    /// Parsed from the model's final answer.
    Primary,
    /// Reconstructed from tool results after `cause`.
    Fallback { cause: Fault },
}

/// A document plus the path that produced it.
#[derive(Debug, Clone)]
pub struct AssembledReport {
    pub document: ReportDocument,
    pub path: AssemblyPath,
}

impl AssembledReport {
    pub fn is_fallback(&self) -> bool {
        matches!(self.path, AssemblyPath::Fallback { .. })
    }
}

/// Parse the model's final answer as a report.
///
/// Tolerates surrounding whitespace and a Markdown code fence.
pub fn parse_final_output(text: &str) -> Result<ReportDocument, Fault> {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Err(Fault::MalformedFinalOutput("final answer is empty".into()));
    }

    serde_json::from_str::<ReportDocument>(cleaned)
        .map_err(|e| Fault::MalformedFinalOutput(e.to_string()))
}

const TEXT_TOOLS: &[&str] = &["extract_exact_text", "generate_summary"];
const BLOCK_TOOL: &str = "extract_figures_tables";

/// Rebuild a report from the tool results in the transcript.
///
/// Each result whose request is known contributes to the section named by
/// its `section_title`, `topic` or `description` argument (first non-empty
/// wins), else to `Extracted_Content_<n>`. Sections keep first-occurrence
/// order. Never returns an empty document.
pub fn reconstruct_from_transcript(transcript: &Transcript) -> ReportDocument {
    let requests: HashMap<&str, &ToolRequest> = transcript
        .tool_requests()
        .map(|r| (r.request_id.as_str(), r))
        .collect();

    let mut builder = ReportBuilder::new();

    for result in transcript.tool_results() {
        let Some(request) = requests.get(result.request_id.as_str()) else {
            debug!(request_id = %result.request_id, "Skipping result without a request");
            continue;
        };

        let title = request
            .arg("section_title")
            .or_else(|| request.arg("topic"))
            .or_else(|| request.arg("description"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Extracted_Content_{}", builder.section_count() + 1));

        let tool_name = request.tool_name.as_str();
        if TEXT_TOOLS.contains(&tool_name) {
            builder.append(
                &title,
                ContentBlock::text(result.payload.to_model_text(tool_name)),
            );
        } else if tool_name == BLOCK_TOOL {
            match &result.payload {
                ToolPayload::Blocks(blocks) if !blocks.is_empty() => {
                    builder.extend(&title, blocks.clone());
                }
                other => builder.append(
                    &title,
                    ContentBlock::text(format!(
                        "Figure/Table tool ({title}) returned unexpected data: {}",
                        other.to_model_text(tool_name)
                    )),
                ),
            }
        } else {
            debug!(tool = tool_name, "Skipping result of unknown tool");
        }
    }

    builder.build().unwrap_or_else(|| {
        ReportDocument::single(
            "Fatal Error",
            ContentBlock::text(format!(
                "Could not generate or parse structured report. Last agent output: {}",
                last_agent_output(transcript)
            )),
        )
    })
}

fn last_agent_output(transcript: &Transcript) -> String {
    match transcript.last() {
        Some(Message::Instruction { .. }) | None => "Agent failed.".into(),
        Some(message) => message.to_string(),
    }
}

/// Produce the document for a finished run.
///
/// A terminal answer that parses is used as-is; every other outcome falls
/// back to reconstruction, recording the fault that caused it.
pub fn assemble(run: &LoopRun) -> AssembledReport {
    let cause = match &run.outcome {
        LoopOutcome::Terminal(text) => match parse_final_output(text) {
            Ok(document) => {
                info!(sections = document.len(), "Parsed structured report from final answer");
                return AssembledReport {
                    document,
                    path: AssemblyPath::Primary,
                };
            }
            Err(fault) => fault,
        },
        LoopOutcome::Exhausted { cap } => Fault::Exhaustion { cap: *cap },
        LoopOutcome::Aborted(reason) => reason.to_fault(),
    };

    warn!(cause = %cause, "Falling back to reconstruction from tool results");
    let document = reconstruct_from_transcript(&run.transcript);
    info!(sections = document.len(), "Reconstructed report from transcript");

    AssembledReport {
        document,
        path: AssemblyPath::Fallback { cause },
    }
}
