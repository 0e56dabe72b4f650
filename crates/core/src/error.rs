//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each failure site has its own error enum so callers can tell
//! retryable (network) failures from permanent (schema) ones.

use thiserror::Error;

/// The top-level error type for a conversation turn.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model adapter errors (fatal for the turn) ---
    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[from] ProviderError),

    // --- Tool errors (normally recovered inside the loop) ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Persistence errors (fatal) ---
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Tool loop exceeded: the model requested tools for more than {limit} rounds")]
    ToolLoopExceeded { limit: u32 },

    #[error("Turn timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Thread '{0}' already has a turn in progress")]
    ThreadBusy(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether retrying the same turn later might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ModelUnavailable(e) => e.is_retryable(),
            Error::Tool(e) => e.is_retryable(),
            Error::Timeout { .. } | Error::ThreadBusy(_) => true,
            _ => false,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Failure-site errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_)
            | ProviderError::Network(_) => true,
            ProviderError::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Tool panicked: {tool_name}: {reason}")]
    Panicked { tool_name: String, reason: String },
}

impl ToolError {
    pub fn invalid_arguments(tool_name: &str, reason: impl std::fmt::Display) -> Self {
        ToolError::InvalidArguments {
            tool_name: tool_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn execution_failed(tool_name: &str, reason: impl std::fmt::Display) -> Self {
        ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Network-style failures are worth retrying; schema failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ToolError::ExecutionFailed { .. } | ToolError::Timeout { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt checkpoint for thread '{thread_id}': {reason}")]
    Corrupt { thread_id: String, reason: String },

    #[error("Invalid thread id: {0}")]
    InvalidThreadId(String),
}
