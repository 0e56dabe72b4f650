//! Tool batch dispatch.
//!
//! One assistant message may request several tools. The batch runs either
//! concurrently (`join_all`) or one call at a time, but the returned
//! tool-result messages are always in request order.
//!
//! Nothing a tool does can fail the batch. Unknown tools, malformed
//! arguments, transport errors, timeouts and panics all become
//! `{"error": ...}` tool results the model can read.

use futures::FutureExt;
use futures::future::join_all;
use parley_core::error::ToolError;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::{Message, MessageToolCall};
use parley_core::tool::{ToolRegistry, ToolResult};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct ToolDispatcher {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
    parallel: bool,
    event_bus: Arc<EventBus>,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            tools,
            timeout: Duration::from_secs(30),
            parallel: true,
            event_bus,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Execute every call and return one tool-result message per call,
    /// in the order the calls were requested.
    ///
    /// Dropping the returned future aborts any calls still running.
    pub async fn run_batch(&self, calls: &[MessageToolCall]) -> Vec<Message> {
        let outcomes = if self.parallel && calls.len() > 1 {
            join_all(calls.iter().map(|call| run_one(&self.tools, call, self.timeout))).await
        } else {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in calls {
                outcomes.push(run_one(&self.tools, call, self.timeout).await);
            }
            outcomes
        };

        calls
            .iter()
            .zip(outcomes)
            .map(|(call, (result, duration_ms))| {
                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: call.name.clone(),
                    success: result.success,
                    duration_ms,
                    timestamp: chrono::Utc::now(),
                });
                Message::tool_result(&call.id, result.output)
            })
            .collect()
    }
}

/// Run one call to completion, converting every failure into an error result.
async fn run_one(tools: &ToolRegistry, call: &MessageToolCall, timeout: Duration) -> (ToolResult, u64) {
    let start = Instant::now();
    let outcome = match parse_call_arguments(call) {
        Ok(arguments) => {
            let invocation = AssertUnwindSafe(tools.invoke(&call.name, arguments)).catch_unwind();
            match tokio::time::timeout(timeout, invocation).await {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => Err(ToolError::Panicked {
                    tool_name: call.name.clone(),
                    reason: panic_message(panic.as_ref()),
                }),
                Err(_) => Err(ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            }
        }
        Err(e) => Err(e),
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    let result = match outcome {
        Ok(result) => {
            debug!(tool = %call.name, success = result.success, duration_ms, "Tool finished");
            result
        }
        Err(e) => {
            warn!(tool = %call.name, error = %e, duration_ms, "Tool failed");
            ToolResult::from(e)
        }
    };
    (result, duration_ms)
}

/// Models send arguments as a JSON string; an empty string means no arguments.
fn parse_call_arguments(call: &MessageToolCall) -> Result<serde_json::Value, ToolError> {
    if call.arguments.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(&call.arguments).map_err(|e| {
        ToolError::invalid_arguments(&call.name, format!("arguments are not valid JSON: {e}"))
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
