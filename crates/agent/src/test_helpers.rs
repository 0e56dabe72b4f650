//! Shared test doubles for the control loop and service tests.

use async_trait::async_trait;
use parley_core::error::{ProviderError, ToolError};
use parley_core::message::{Message, MessageToolCall};
use parley_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use parley_core::tool::{Tool, ToolResult};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A provider that replays a fixed script of responses and records
/// every request it receives.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn answers(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".into())))
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock-model".into(),
    }
}

pub fn tool_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_calls("", calls),
        usage: usage(),
        model: "mock-model".into(),
    }
}

pub fn call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}

/// Echoes `text` back after sleeping `delay_ms`.
pub struct DelayedEchoTool;

#[async_trait]
impl Tool for DelayedEchoTool {
    fn name(&self) -> &str {
        "delayed_echo"
    }
    fn description(&self) -> &str {
        "Echo text after a delay"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "delay_ms": {"type": "integer"}
            },
            "required": ["text", "delay_ms"]
        })
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let text = arguments["text"].as_str().unwrap_or_default().to_string();
        let delay = arguments["delay_ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(ToolResult::text(text))
    }
}

/// Always panics.
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "explode"
    }
    fn description(&self) -> &str {
        "Panics on every call"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        panic!("tool blew up");
    }
}
