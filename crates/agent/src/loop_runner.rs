//! The control loop: model, tools, model again, until a final answer.

use crate::dispatch::ToolDispatcher;
use parley_core::error::{Error, Result};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::{Conversation, Message, MessageToolCall};
use parley_core::provider::{AssistantResponse, Provider, ProviderRequest, ToolDefinition};
use parley_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a turn currently stands.
#[derive(Debug)]
enum LoopState {
    /// The log ends in a user message or tool results; ask the model.
    AwaitingModel,
    /// The model asked for these calls; their results go in next.
    ExecutingTools(Vec<MessageToolCall>),
    /// The model answered.
    Done(String),
}

/// Drives one turn of a conversation against a model and a tool registry.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Sent ahead of the history on every request, never stored in it
    system_prompt: Option<String>,

    /// Tool round-trips allowed per turn
    max_tool_rounds: u32,

    dispatcher: ToolDispatcher,

    /// Schemas sent with every request, computed once
    tool_definitions: Vec<ToolDefinition>,

    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let tool_definitions = tools.definitions();
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            system_prompt: None,
            max_tool_rounds: 10,
            dispatcher: ToolDispatcher::new(tools, event_bus.clone()),
            tool_definitions,
            event_bus,
        }
    }

    /// Set the maximum number of tool round-trips per turn.
    pub fn with_max_tool_rounds(mut self, max: u32) -> Self {
        self.max_tool_rounds = max;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Bound each individual tool call.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher = self.dispatcher.with_timeout(timeout);
        self
    }

    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.dispatcher = self.dispatcher.with_parallel(parallel);
        self
    }

    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        &self.tool_definitions
    }

    fn build_request(&self, conversation: &Conversation) -> ProviderRequest {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt));
        }
        messages.extend_from_slice(conversation.messages());

        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tool_definitions.clone(),
        }
    }

    /// Run the loop until the model produces a final answer.
    ///
    /// The conversation must already end with the new user message. On
    /// success it ends with the final assistant message; on error it may
    /// hold a partial turn and must not be persisted.
    pub async fn process(&self, conversation: &mut Conversation) -> Result<String> {
        info!(
            thread_id = %conversation.thread_id,
            messages = conversation.len(),
            "Processing conversation"
        );

        let mut rounds: u32 = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    debug!(thread_id = %conversation.thread_id, iteration = rounds + 1, "Calling model");
                    let response = self.provider.complete(self.build_request(conversation)).await?;

                    if let Some(usage) = &response.usage {
                        self.event_bus.publish(DomainEvent::ResponseGenerated {
                            thread_id: conversation.thread_id.to_string(),
                            model: response.model.clone(),
                            tokens_used: usage.total_tokens,
                            timestamp: chrono::Utc::now(),
                        });
                    }

                    match response.into_assistant_response() {
                        AssistantResponse::FinalAnswer(message) => {
                            let answer = message.content.clone();
                            conversation.push(message);
                            LoopState::Done(answer)
                        }
                        AssistantResponse::ToolRequest { message, calls } => {
                            rounds += 1;
                            if rounds > self.max_tool_rounds {
                                warn!(
                                    thread_id = %conversation.thread_id,
                                    limit = self.max_tool_rounds,
                                    "Tool round limit reached"
                                );
                                return Err(Error::ToolLoopExceeded {
                                    limit: self.max_tool_rounds,
                                });
                            }
                            conversation.push(message);
                            LoopState::ExecutingTools(calls)
                        }
                    }
                }

                LoopState::ExecutingTools(calls) => {
                    debug!(tool_count = calls.len(), iteration = rounds, "Executing tool calls");
                    for result in self.dispatcher.run_batch(&calls).await {
                        conversation.push(result);
                    }
                    LoopState::AwaitingModel
                }

                LoopState::Done(answer) => return Ok(answer),
            };
        }
    }
}
