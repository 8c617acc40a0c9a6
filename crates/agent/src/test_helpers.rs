//! Shared test helpers for agent tests.

use async_trait::async_trait;
use dossier_core::error::{ProviderError, RetrievalError, ToolError};
use dossier_core::knowledge::{AssetStore, Passage, Retrieval};
use dossier_core::message::{ModelTurn, ToolArgs, ToolRequest, Transcript};
use dossier_core::model::ModelClient;
use dossier_core::tool::{ParamSpec, ReturnShape, Tool, ToolOutput, ToolRegistry};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

pub fn args(pairs: &[(&str, &str)]) -> ToolArgs {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn request(id: &str, tool: &str, pairs: &[(&str, &str)]) -> ToolRequest {
    ToolRequest::new(id, tool, args(pairs))
}

/// A model client that returns a sequence of scripted turns.
///
/// Each call to `send` returns the next turn in the queue. Panics if more
/// calls are made than turns provided.
pub struct SequentialMockModel {
    turns: Mutex<Vec<Result<ModelTurn, ProviderError>>>,
    call_count: Mutex<usize>,
    seen_lengths: Mutex<Vec<usize>>,
}

impl SequentialMockModel {
    pub fn new(turns: Vec<Result<ModelTurn, ProviderError>>) -> Self {
        Self {
            turns: Mutex::new(turns),
            call_count: Mutex::new(0),
            seen_lengths: Mutex::new(Vec::new()),
        }
    }

    pub fn answers(turns: Vec<ModelTurn>) -> Self {
        Self::new(turns.into_iter().map(Ok).collect())
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Transcript length observed on each call.
    pub fn seen_lengths(&self) -> Vec<usize> {
        self.seen_lengths.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for SequentialMockModel {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn send(&self, transcript: &Transcript) -> Result<ModelTurn, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let turns = self.turns.lock().unwrap();

        if *count >= turns.len() {
            panic!(
                "SequentialMockModel: no more turns (call #{}, have {})",
                *count,
                turns.len()
            );
        }

        let turn = turns[*count].clone();
        *count += 1;
        self.seen_lengths.lock().unwrap().push(transcript.len());
        turn
    }
}

/// A model client that requests the same tool forever.
pub struct AlwaysToolModel {
    calls: Mutex<usize>,
}

impl AlwaysToolModel {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ModelClient for AlwaysToolModel {
    fn name(&self) -> &str {
        "always_tool"
    }

    async fn send(&self, _transcript: &Transcript) -> Result<ModelTurn, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        Ok(ModelTurn::tool_requests(vec![request(
            "loop",
            "echo",
            &[("value", "again")],
        )]))
    }
}

/// A model client that never answers within any reasonable time.
pub struct StalledModel;

#[async_trait]
impl ModelClient for StalledModel {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn send(&self, _transcript: &Transcript) -> Result<ModelTurn, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ModelTurn::answer("too late"))
    }
}

/// Echoes its `value` argument.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the value back"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("value", "Value to echo")]
    }

    fn returns(&self) -> ReturnShape {
        ReturnShape::Text
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::Text(args.get("value").cloned().unwrap_or_default()))
    }
}

/// Sleeps for `secs` seconds, then echoes them.
pub struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Sleep, then answer"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("secs", "Seconds to sleep")]
    }

    fn returns(&self) -> ReturnShape {
        ReturnShape::Text
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let secs = args
            .get("secs")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ToolError::InvalidArguments("secs must be a number".into()))?;
        tokio::time::sleep(Duration::from_secs(secs)).await;
        Ok(ToolOutput::Text(format!("slept {secs}s")))
    }
}

/// Panics on every call.
pub struct ExplodeTool;

#[async_trait]
impl Tool for ExplodeTool {
    fn name(&self) -> &str {
        "explode"
    }

    fn description(&self) -> &str {
        "Always panics"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn returns(&self) -> ReturnShape {
        ReturnShape::Text
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        panic!("detonated");
    }
}

pub fn registry_with_failures() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool));
    registry.register(Box::new(ExplodeTool));
    registry.register(Box::new(SlowTool));
    registry
}

/// Retrieval with fixed passages and a fixed answer.
pub struct StubRetrieval {
    pub passages: Vec<Passage>,
    pub answer: String,
}

impl StubRetrieval {
    pub fn new(passage: &str, answer: &str) -> Self {
        Self {
            passages: vec![Passage::new(passage)],
            answer: answer.to_string(),
        }
    }
}

#[async_trait]
impl Retrieval for StubRetrieval {
    fn name(&self) -> &str {
        "stub"
    }

    async fn retrieve(&self, _query: &str) -> Result<Vec<Passage>, RetrievalError> {
        Ok(self.passages.clone())
    }

    async fn rag_answer(&self, _query: &str) -> Result<String, RetrievalError> {
        Ok(self.answer.clone())
    }
}

/// Asset store with a fixed set of present file names under `/assets`.
pub struct StubAssets {
    pub present: Vec<String>,
}

impl AssetStore for StubAssets {
    fn exists(&self, name: &str) -> bool {
        self.present.iter().any(|p| p == name)
    }

    fn resolve(&self, name: &str) -> PathBuf {
        PathBuf::from("/assets").join(name)
    }
}
