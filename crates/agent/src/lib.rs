//! The control loop and the conversation service built on it.
//!
//! A turn follows a **Model → Tools → Model** cycle:
//!
//! 1. **Receive** a user message for a thread
//! 2. **Resume** the thread from its latest checkpoint
//! 3. **Send to LLM** with the full history and every tool schema
//! 4. **If tool calls**: run the batch, append results in request order, go to 3
//! 5. **If text response**: append it, checkpoint once, return the answer
//!
//! The cycle is bounded by `max_tool_rounds` and the whole turn by a timeout.

pub mod dispatch;
pub mod loop_runner;
pub mod service;

#[cfg(test)]
mod test_helpers;

pub use dispatch::ToolDispatcher;
pub use loop_runner::AgentLoop;
pub use service::ConversationService;
