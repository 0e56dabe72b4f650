//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley
//! conversational agent backend. This crate has **no I/O**. It defines
//! the domain model that all other crates implement against.
//!
//! ## Seams
//!
//! - [`Provider`]: the model adapter (prompt + tool schemas in, one response out)
//! - [`Tool`] / [`ToolRegistry`]: the fixed set of callable tools
//! - [`CheckpointStore`]: durable thread snapshots
//!
//! Implementations live in their own crates, so the control loop can be
//! tested against scripted providers and in-memory stores.

pub mod checkpoint;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use checkpoint::{Checkpoint, CheckpointMeta, CheckpointStore};
pub use error::{Error, ProviderError, Result, StoreError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, Message, MessageToolCall, Role, ThreadId};
pub use provider::{AssistantResponse, Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolRegistry, ToolResult};
