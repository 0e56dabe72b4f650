//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are fixed at process start. Each one has a name, a description
//! the model reads when deciding to call it, a JSON Schema for its input,
//! and an executor that never touches conversation state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool produced a result rather than a structured error
    pub success: bool,

    /// The content fed back to the model
    pub output: String,

    /// Structured payload, when the tool has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful flat `{key: primitive}` result.
    pub fn structured(data: serde_json::Map<String, serde_json::Value>) -> Self {
        let data = serde_json::Value::Object(data);
        Self {
            success: true,
            output: data.to_string(),
            data: Some(data),
        }
    }

    /// A structured `{"error": message}` payload.
    pub fn error(message: impl Into<String>) -> Self {
        let data = serde_json::json!({ "error": message.into() });
        Self {
            success: false,
            output: data.to_string(),
            data: Some(data),
        }
    }

    /// Free-form text, as returned by search providers.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            data: None,
        }
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::error(err.to_string())
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    ///
    /// Expected failures (bad location, division by zero) come back as
    /// `Ok(ToolResult::error(..))`; `Err` is reserved for malformed input
    /// and transport failures.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Deserialize tool arguments into a typed input struct.
pub fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: serde_json::Value,
) -> std::result::Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::invalid_arguments(tool_name, e))
}

/// The registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
///
/// Tools are held behind `Arc` so the registry can be shared across threads.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replacing previously registered tool");
        }
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Invoke a tool by name.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(arguments).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}
