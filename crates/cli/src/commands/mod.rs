//! Subcommand implementations and the wiring they share.

pub mod chat;
pub mod history;
pub mod serve;
pub mod threads;
pub mod tools;

use anyhow::Context;
use parley_agent::{AgentLoop, ConversationService};
use parley_config::AppConfig;
use parley_core::event::{DomainEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Build the conversation service from configuration.
///
/// Fails fast when any of the three credentials is missing.
pub async fn build_service(config: &AppConfig) -> anyhow::Result<Arc<ConversationService>> {
    let credentials = config
        .require_credentials()
        .context("Missing credentials; set them in the environment, a .env file, or config.toml")?;

    let provider = parley_providers::build_from_config(&config.model, &credentials.model_api_key)
        .context("Failed to build model adapter")?;
    let tools = parley_tools::default_registry(
        &config.tools,
        &credentials.weather_api_key,
        &credentials.stock_api_key,
    )
    .context("Failed to build tool registry")?;
    let store = parley_store::build_from_config(&config.store)
        .await
        .with_context(|| format!("Failed to open {} store at {}", config.store.backend, config.store.path))?;

    let event_bus = Arc::new(EventBus::default());
    spawn_event_logger(&event_bus);

    let mut agent = AgentLoop::new(
        provider,
        &config.model.model,
        config.model.temperature,
        Arc::new(tools),
        event_bus.clone(),
    )
    .with_tool_timeout(Duration::from_secs(config.tools.timeout_secs));
    if let Some(max_tokens) = config.model.max_tokens {
        agent = agent.with_max_tokens(max_tokens);
    }

    Ok(Arc::new(ConversationService::from_config(
        agent,
        store,
        event_bus,
        &config.agent,
    )))
}

/// Log domain events at debug level until the bus closes.
fn spawn_event_logger(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event.as_ref() {
                    DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } => {
                        tracing::debug!(tool = %tool_name, success, duration_ms, "event: tool executed");
                    }
                    DomainEvent::CheckpointSaved { thread_id, seq, message_count, .. } => {
                        tracing::debug!(thread_id = %thread_id, seq, message_count, "event: checkpoint saved");
                    }
                    other => tracing::trace!(?other, "event"),
                },
                Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
