//! Built-in tool implementations for Parley.
//!
//! Four tools are exposed to the model: a calculator, a current-weather
//! lookup, a stock quote lookup, and a web search. The HTTP-backed tools
//! share one `reqwest::Client` bounded by `tools.timeout_secs`.

pub mod calculator;
pub mod http;
pub mod stock_price;
pub mod weather;
pub mod web_search;

use parley_config::ToolsConfig;
use parley_core::error::ToolError;
use parley_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

pub use calculator::CalculatorTool;
pub use stock_price::StockPriceTool;
pub use weather::WeatherTool;
pub use web_search::WebSearchTool;

/// Create the registry with every built-in tool.
///
/// API keys come from resolved credentials rather than `config`, so the
/// caller decides how missing keys are handled.
pub fn default_registry(
    config: &ToolsConfig,
    weather_api_key: &str,
    stock_api_key: &str,
) -> Result<ToolRegistry, ToolError> {
    let client = http::build_client(Duration::from_secs(config.timeout_secs))?;

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CalculatorTool));
    registry.register(Arc::new(WeatherTool::new(
        client.clone(),
        &config.weather.base_url,
        weather_api_key,
    )));
    registry.register(Arc::new(StockPriceTool::new(
        client.clone(),
        &config.stock.base_url,
        stock_api_key,
    )));
    registry.register(Arc::new(WebSearchTool::new(
        client,
        &config.search.base_url,
        &config.search.region,
        config.search.max_results,
    )));

    tracing::debug!(tools = ?registry.names(), "Tool registry ready");
    Ok(registry)
}
