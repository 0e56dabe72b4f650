//! Language-model adapters for Parley.
//!
//! All adapters implement the `parley_core::Provider` trait.

pub mod openai_compat;

use std::sync::Arc;
use std::time::Duration;

use parley_config::ModelConfig;
use parley_core::error::ProviderError;
use parley_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the model adapter described by the `[model]` config section.
pub fn build_from_config(
    config: &ModelConfig,
    api_key: &str,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider = OpenAiCompatProvider::new(
        "openai",
        &config.base_url,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    tracing::debug!(base_url = %config.base_url, model = %config.model, "Model adapter configured");
    Ok(Arc::new(provider))
}
