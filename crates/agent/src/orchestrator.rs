//! The bounded model/tool control loop.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Start → AwaitingModel → DispatchingTools → AwaitingModel → …
//!                       ↘ Terminal | Exhausted | Aborted
//! ```
//!
//! Round-trips are strictly serial. Each model call runs under a timeout
//! and races the cancellation token; a tool batch, once started, always
//! completes and is recorded before cancellation is observed again.

use dossier_core::error::{Fault, ProviderError};
use dossier_core::event::{DomainEvent, EventBus};
use dossier_core::message::{ModelTurn, ToolRequest, Transcript};
use dossier_core::model::ModelClient;
use dossier_core::tool::ToolRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatcher::ToolDispatcher;

/// Why a run stopped before the model produced a final answer.
#[derive(Debug, Clone)]
pub enum AbortReason {
    /// The backend failed.
    Backend(ProviderError),
    /// The model call exceeded the configured timeout.
    Timeout(Duration),
    /// The caller cancelled the run.
    Cancelled,
}

impl AbortReason {
    /// The orchestration fault this abort degrades to.
    pub fn to_fault(&self) -> Fault {
        match self {
            Self::Backend(e) => Fault::Backend(e.clone()),
            Self::Timeout(limit) => Fault::Backend(ProviderError::Timeout(format!(
                "no model response within {}s",
                limit.as_secs()
            ))),
            Self::Cancelled => Fault::Cancelled,
        }
    }
}

/// Loop state.
#[derive(Debug, Clone)]
pub enum LoopState {
    Start,
    AwaitingModel,
    DispatchingTools(Vec<ToolRequest>),
    Terminal(String),
    Exhausted,
    Aborted(AbortReason),
}

impl LoopState {
    /// The state that follows a model turn.
    ///
    /// An answer, or a request turn with no requests, is terminal.
    pub fn after_model_turn(turn: &ModelTurn) -> Self {
        match turn {
            ModelTurn::Answer { text } => Self::Terminal(text.clone()),
            ModelTurn::ToolRequests { requests } if requests.is_empty() => {
                Self::Terminal(String::new())
            }
            ModelTurn::ToolRequests { requests } => Self::DispatchingTools(requests.clone()),
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Terminal(_) | Self::Exhausted | Self::Aborted(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AwaitingModel => "awaiting_model",
            Self::DispatchingTools(_) => "dispatching_tools",
            Self::Terminal(_) => "terminal",
            Self::Exhausted => "exhausted",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum LoopOutcome {
    /// The model produced a candidate final answer.
    Terminal(String),
    /// The round-trip cap was reached without a final answer.
    Exhausted { cap: u32 },
    Aborted(AbortReason),
}

impl LoopOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Terminal(_) => "terminal",
            Self::Exhausted { .. } => "exhausted",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// The result of one orchestration run.
#[derive(Debug, Clone)]
pub struct LoopRun {
    pub outcome: LoopOutcome,
    pub transcript: Transcript,
    /// Number of model calls made.
    pub round_trips: u32,
}

/// Drives one request through the model/tool loop.
///
/// Holds only immutable collaborators; independent runs may execute
/// concurrently against the same orchestrator.
pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    dispatcher: ToolDispatcher,
    max_round_trips: u32,
    model_timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>) -> Self {
        let event_bus = Arc::new(EventBus::default());
        Self {
            model,
            dispatcher: ToolDispatcher::new(tools).with_event_bus(event_bus.clone()),
            max_round_trips: 8,
            model_timeout: Duration::from_secs(120),
            event_bus,
        }
    }

    /// Set the maximum number of model round-trips per run.
    pub fn with_max_round_trips(mut self, max: u32) -> Self {
        self.max_round_trips = max;
        self
    }

    /// Set the timeout applied to every model call.
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Run tools of a batch concurrently (default) or sequentially.
    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.dispatcher = self.dispatcher.with_parallel(parallel);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.dispatcher = self.dispatcher.with_event_bus(event_bus.clone());
        self.event_bus = event_bus;
        self
    }

    pub fn max_round_trips(&self) -> u32 {
        self.max_round_trips
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// Run to completion.
    pub async fn run(&self, instruction: impl Into<String>) -> LoopRun {
        self.run_with_cancel(instruction, &CancellationToken::new())
            .await
    }

    /// Run until a final state or until `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        instruction: impl Into<String>,
        cancel: &CancellationToken,
    ) -> LoopRun {
        let mut transcript = Transcript::new(instruction);
        let mut round_trips: u32 = 0;
        let mut state = LoopState::Start;

        info!(
            transcript_id = %transcript.id(),
            model = self.model.name(),
            cap = self.max_round_trips,
            "Starting orchestration run"
        );

        let outcome = loop {
            debug!(state = state.name(), round_trips, "Loop state");
            state = match state {
                // The transcript already holds the instruction.
                LoopState::Start => LoopState::AwaitingModel,

                LoopState::AwaitingModel => {
                    if cancel.is_cancelled() {
                        LoopState::Aborted(AbortReason::Cancelled)
                    } else if round_trips >= self.max_round_trips {
                        LoopState::Exhausted
                    } else {
                        round_trips += 1;
                        self.model_round_trip(&mut transcript, round_trips, cancel)
                            .await
                    }
                }

                LoopState::DispatchingTools(requests) => {
                    if cancel.is_cancelled() {
                        LoopState::Aborted(AbortReason::Cancelled)
                    } else {
                        let results = self.dispatcher.execute_batch(&requests).await;
                        for result in results {
                            transcript.push_tool_result(result);
                        }
                        LoopState::AwaitingModel
                    }
                }

                LoopState::Terminal(text) => break LoopOutcome::Terminal(text),
                LoopState::Exhausted => {
                    warn!(cap = self.max_round_trips, "Round-trip cap reached");
                    break LoopOutcome::Exhausted {
                        cap: self.max_round_trips,
                    };
                }
                LoopState::Aborted(reason) => {
                    warn!(reason = ?reason, "Orchestration aborted");
                    if !matches!(reason, AbortReason::Cancelled) {
                        self.event_bus.publish(DomainEvent::ErrorOccurred {
                            context: format!("model call in transcript {}", transcript.id()),
                            error_message: reason.to_fault().to_string(),
                            timestamp: chrono::Utc::now(),
                        });
                    }
                    break LoopOutcome::Aborted(reason);
                }
            };
        };

        info!(
            transcript_id = %transcript.id(),
            outcome = outcome.name(),
            round_trips,
            messages = transcript.len(),
            "Orchestration run finished"
        );
        self.event_bus.publish(DomainEvent::RunFinished {
            transcript_id: transcript.id().to_string(),
            outcome: outcome.name().to_string(),
            round_trips,
            timestamp: chrono::Utc::now(),
        });

        LoopRun {
            outcome,
            transcript,
            round_trips,
        }
    }

    /// One model call: send, normalize, append, and decide the next state.
    async fn model_round_trip(
        &self,
        transcript: &mut Transcript,
        round: u32,
        cancel: &CancellationToken,
    ) -> LoopState {
        let call = tokio::time::timeout(self.model_timeout, self.model.send(transcript));
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return LoopState::Aborted(AbortReason::Cancelled),
            response = call => response,
        };

        let turn = match response {
            Err(_elapsed) => return LoopState::Aborted(AbortReason::Timeout(self.model_timeout)),
            Ok(Err(e)) => return LoopState::Aborted(AbortReason::Backend(e)),
            Ok(Ok(turn)) => normalize_request_ids(turn, transcript, round),
        };

        let next = LoopState::after_model_turn(&turn);
        let tool_requests = turn.requests().len();
        transcript.push_model_turn(turn);

        debug!(round, tool_requests, "Model round-trip completed");
        self.event_bus.publish(DomainEvent::RoundTripCompleted {
            transcript_id: transcript.id().to_string(),
            round,
            tool_requests,
            timestamp: chrono::Utc::now(),
        });

        next
    }
}

/// Make every request id non-empty and unique within the transcript.
///
/// Offending ids are replaced with `call_<round>_<index>`.
pub fn normalize_request_ids(turn: ModelTurn, transcript: &Transcript, round: u32) -> ModelTurn {
    let ModelTurn::ToolRequests { requests } = turn else {
        return turn;
    };

    let mut seen: HashSet<String> = transcript
        .tool_requests()
        .map(|r| r.request_id.clone())
        .collect();

    let requests = requests
        .into_iter()
        .enumerate()
        .map(|(index, mut request)| {
            if request.request_id.is_empty() || seen.contains(&request.request_id) {
                let mut candidate = format!("call_{round}_{index}");
                let mut suffix = 0;
                while seen.contains(&candidate) {
                    suffix += 1;
                    candidate = format!("call_{round}_{index}_{suffix}");
                }
                debug!(from = %request.request_id, to = %candidate, "Relabelled tool request id");
                request.request_id = candidate;
            }
            seen.insert(request.request_id.clone());
            request
        })
        .collect();

    ModelTurn::ToolRequests { requests }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        AlwaysToolModel, SequentialMockModel, StalledModel, registry_with_failures, request,
    };
    use dossier_core::message::{Message, ToolPayload};

    fn tools() -> Arc<ToolRegistry> {
        Arc::new(registry_with_failures())
    }

    #[test]
    fn transition_on_answer_is_terminal() {
        let state = LoopState::after_model_turn(&ModelTurn::answer("{}"));
        assert!(matches!(state, LoopState::Terminal(ref t) if t == "{}"));
        assert!(state.is_final());
    }

    #[test]
    fn transition_on_empty_requests_is_terminal() {
        let state = LoopState::after_model_turn(&ModelTurn::tool_requests(Vec::new()));
        assert!(matches!(state, LoopState::Terminal(ref t) if t.is_empty()));
    }

    #[test]
    fn transition_on_requests_dispatches() {
        let turn = ModelTurn::tool_requests(vec![request("1", "echo", &[("value", "x")])]);
        match LoopState::after_model_turn(&turn) {
            LoopState::DispatchingTools(requests) => assert_eq!(requests.len(), 1),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn ids_are_normalized() {
        let mut transcript = Transcript::new("go");
        transcript.push_model_turn(ModelTurn::tool_requests(vec![request("dup", "echo", &[])]));

        let turn = ModelTurn::tool_requests(vec![
            request("", "echo", &[]),
            request("dup", "echo", &[]),
            request("fresh", "echo", &[]),
            request("fresh", "echo", &[]),
        ]);
        let ids: Vec<String> = normalize_request_ids(turn, &transcript, 2)
            .requests()
            .iter()
            .map(|r| r.request_id.clone())
            .collect();
        assert_eq!(ids, vec!["call_2_0", "call_2_1", "fresh", "call_2_3"]);
    }

    #[tokio::test]
    async fn answer_on_first_round_trip() {
        let model = Arc::new(SequentialMockModel::answers(vec![ModelTurn::answer("done")]));
        let run = Orchestrator::new(model.clone(), tools()).run("instruction").await;

        assert!(matches!(run.outcome, LoopOutcome::Terminal(ref t) if t == "done"));
        assert_eq!(run.round_trips, 1);
        assert_eq!(run.transcript.len(), 2);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_results_follow_requests_in_order() {
        let model = Arc::new(SequentialMockModel::answers(vec![
            ModelTurn::tool_requests(vec![
                request("a", "echo", &[("value", "1")]),
                request("b", "explode", &[]),
                request("c", "echo", &[("value", "3")]),
            ]),
            ModelTurn::answer("final"),
        ]));
        let run = Orchestrator::new(model.clone(), tools()).run("go").await;

        assert!(matches!(run.outcome, LoopOutcome::Terminal(_)));
        assert_eq!(run.round_trips, 2);
        // instruction, requests, 3 results, answer
        assert_eq!(run.transcript.len(), 6);
        // the second call saw the instruction, the requests and all results
        assert_eq!(model.seen_lengths(), vec![1, 5]);

        let results: Vec<_> = run.transcript.tool_results().collect();
        assert_eq!(results[0].payload, ToolPayload::Text("1".into()));
        assert!(results[1].is_error());
        assert_eq!(results[2].payload, ToolPayload::Text("3".into()));
    }

    #[tokio::test]
    async fn always_tool_model_exhausts_at_cap() {
        let model = Arc::new(AlwaysToolModel::new());
        let run = Orchestrator::new(model.clone(), tools())
            .with_max_round_trips(3)
            .run("go")
            .await;

        assert!(matches!(run.outcome, LoopOutcome::Exhausted { cap: 3 }));
        assert_eq!(model.call_count(), 3);
        assert_eq!(run.round_trips, 3);
        // every request still got exactly one result
        assert_eq!(run.transcript.tool_requests().count(), 3);
        assert_eq!(run.transcript.tool_results().count(), 3);

        let ids: HashSet<_> = run.transcript.tool_requests().map(|r| r.request_id.clone()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn default_cap_is_eight() {
        let model = Arc::new(AlwaysToolModel::new());
        let run = Orchestrator::new(model.clone(), tools()).run("go").await;
        assert!(matches!(run.outcome, LoopOutcome::Exhausted { cap: 8 }));
        assert_eq!(model.call_count(), 8);
    }

    #[tokio::test]
    async fn backend_error_aborts() {
        let model = Arc::new(SequentialMockModel::new(vec![Err(ProviderError::Network(
            "connection refused".into(),
        ))]));
        let run = Orchestrator::new(model, tools()).run("go").await;

        match run.outcome {
            LoopOutcome::Aborted(AbortReason::Backend(ProviderError::Network(msg))) => {
                assert_eq!(msg, "connection refused")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(run.transcript.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out() {
        let run = Orchestrator::new(Arc::new(StalledModel), tools())
            .with_model_timeout(Duration::from_secs(5))
            .run("go")
            .await;
        assert!(matches!(run.outcome, LoopOutcome::Aborted(AbortReason::Timeout(_))));
        assert!(matches!(
            AbortReason::Timeout(Duration::from_secs(5)).to_fault(),
            Fault::Backend(ProviderError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let model = Arc::new(SequentialMockModel::answers(Vec::new()));
        let run = Orchestrator::new(model.clone(), tools())
            .run_with_cancel("go", &cancel)
            .await;

        assert!(matches!(run.outcome, LoopOutcome::Aborted(AbortReason::Cancelled)));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_model_call() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let run = Orchestrator::new(Arc::new(StalledModel), tools())
            .run_with_cancel("go", &cancel)
            .await;
        assert!(matches!(run.outcome, LoopOutcome::Aborted(AbortReason::Cancelled)));
        assert!(matches!(run.transcript.last(), Some(Message::Instruction { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_tools_keeps_the_whole_batch() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let model = Arc::new(SequentialMockModel::answers(vec![
            ModelTurn::tool_requests(vec![
                request("a", "slow", &[("secs", "2")]),
                request("b", "echo", &[("value", "fast")]),
                request("c", "slow", &[("secs", "3")]),
            ]),
            ModelTurn::answer("never requested"),
        ]));
        let run = Orchestrator::new(model.clone(), tools())
            .run_with_cancel("go", &cancel)
            .await;

        assert!(matches!(run.outcome, LoopOutcome::Aborted(AbortReason::Cancelled)));
        assert_eq!(model.call_count(), 1);
        assert_eq!(run.round_trips, 1);

        let results: Vec<_> = run.transcript.tool_results().collect();
        let ids: Vec<_> = results.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(results[0].payload, ToolPayload::Text("slept 2s".into()));
        assert_eq!(results[1].payload, ToolPayload::Text("fast".into()));
        assert_eq!(results[2].payload, ToolPayload::Text("slept 3s".into()));
        assert!(matches!(run.transcript.last(), Some(Message::ToolResult(_))));
    }

    #[tokio::test]
    async fn events_are_published() {
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        let model = Arc::new(SequentialMockModel::answers(vec![
            ModelTurn::tool_requests(vec![request("a", "echo", &[("value", "1")])]),
            ModelTurn::answer("{}"),
        ]));
        Orchestrator::new(model, tools())
            .with_event_bus(bus.clone())
            .run("go")
            .await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::RoundTripCompleted { .. } => "round_trip",
                DomainEvent::ToolExecuted { .. } => "tool",
                DomainEvent::RunFinished { .. } => "finished",
                DomainEvent::ErrorOccurred { .. } => "error",
            });
        }
        assert_eq!(kinds, vec!["round_trip", "tool", "round_trip", "finished"]);
    }

    #[tokio::test]
    async fn backend_abort_publishes_error_event() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let model = Arc::new(SequentialMockModel::new(vec![Err(ProviderError::Network(
            "connection refused".into(),
        ))]));
        Orchestrator::new(model, tools())
            .with_event_bus(bus.clone())
            .run("go")
            .await;

        match rx.try_recv().unwrap().as_ref() {
            DomainEvent::ErrorOccurred { error_message, .. } => {
                assert!(error_message.contains("connection refused"))
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            rx.try_recv().unwrap().as_ref(),
            DomainEvent::RunFinished { .. }
        ));
    }
}
