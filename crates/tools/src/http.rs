//! Shared HTTP plumbing for the network-backed tools.

use parley_core::error::ToolError;
use std::time::Duration;

/// Build the client shared by all HTTP tools.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ToolError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ToolError::execution_failed("http", format!("HTTP client: {e}")))
}

/// Fetch a URL and decode the body as JSON, whatever the status code.
///
/// Transport and decode failures map to `ExecutionFailed` for `tool_name`.
pub async fn get_json(
    tool_name: &str,
    request: reqwest::RequestBuilder,
) -> Result<(reqwest::StatusCode, serde_json::Value), ToolError> {
    let response = request
        .send()
        .await
        .map_err(|e| ToolError::execution_failed(tool_name, e))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ToolError::execution_failed(tool_name, e))?;

    // Error pages are often not JSON; callers decide based on the status.
    let json = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    Ok((status, json))
}
