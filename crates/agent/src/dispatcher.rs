//! Tool batch execution with per-call failure isolation.

use dossier_core::event::{DomainEvent, EventBus};
use dossier_core::message::{ToolPayload, ToolRequest, ToolResult};
use dossier_core::tool::ToolRegistry;
use futures::FutureExt;
use futures::future::join_all;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Runs batches of tool requests against a registry.
///
/// Every request yields exactly one [`ToolResult`], in request order. A
/// failing request (unknown tool, bad arguments, handler error or panic)
/// becomes an error-tagged result and never affects its siblings.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    parallel: bool,
    event_bus: Arc<EventBus>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            parallel: true,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Run the requests of a batch concurrently (default) or one by one.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute every request; output order equals input order.
    pub async fn execute_batch(&self, requests: &[ToolRequest]) -> Vec<ToolResult> {
        debug!(count = requests.len(), parallel = self.parallel, "Dispatching tool batch");

        if self.parallel {
            return join_all(requests.iter().map(|r| self.execute_one(r))).await;
        }

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.execute_one(request).await);
        }
        results
    }

    async fn execute_one(&self, request: &ToolRequest) -> ToolResult {
        let start = Instant::now();
        let outcome = AssertUnwindSafe(self.registry.execute(request))
            .catch_unwind()
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let payload = match outcome {
            Ok(Ok(output)) => ToolPayload::from(output),
            Ok(Err(e)) => {
                warn!(tool = %request.tool_name, request_id = %request.request_id, error = %e, "Tool execution failed");
                ToolPayload::Error(e.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(tool = %request.tool_name, request_id = %request.request_id, reason = %reason, "Tool panicked");
                ToolPayload::Error(format!("Tool panicked: {reason}"))
            }
        };

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: request.tool_name.clone(),
            success: !payload.is_error(),
            duration_ms,
            timestamp: chrono::Utc::now(),
        });

        ToolResult {
            request_id: request.request_id.clone(),
            tool_name: request.tool_name.clone(),
            args_echo: request.args.clone(),
            payload,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
