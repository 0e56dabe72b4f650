//! Stock quote tool: latest price for a ticker from Alpha Vantage.
//!
//! Quote values are passed through exactly as the provider returns them
//! (Alpha Vantage sends numbers as strings).

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::tool::{Tool, ToolResult, parse_arguments};
use serde::Deserialize;

pub struct StockPriceTool {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl StockPriceTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StockArgs {
    symbol: String,
}

/// Output key → Alpha Vantage `Global Quote` field.
const QUOTE_FIELDS: [(&str, &str); 7] = [
    ("symbol", "01. symbol"),
    ("open", "02. open"),
    ("high", "03. high"),
    ("low", "04. low"),
    ("price", "05. price"),
    ("previous_close", "08. previous close"),
    ("latest_trading_day", "07. latest trading day"),
];

#[async_trait]
impl Tool for StockPriceTool {
    fn name(&self) -> &str {
        "get_stock_price"
    }

    fn description(&self) -> &str {
        "Fetch latest stock price for a given symbol (e.g. 'AAPL', 'TSLA') using Alpha Vantage."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "The ticker symbol, e.g. 'AAPL'"
                }
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: StockArgs = parse_arguments(self.name(), arguments)?;
        let url = format!("{}/query", self.base_url);

        let request = self.client.get(&url).query(&[
            ("function", "GLOBAL_QUOTE"),
            ("symbol", args.symbol.as_str()),
            ("apikey", self.api_key.as_str()),
        ]);
        let (_status, body) = crate::http::get_json(self.name(), request).await?;

        let quote = match body.get("Global Quote").and_then(|q| q.as_object()) {
            Some(quote) if !quote.is_empty() => quote,
            _ => {
                return Ok(ToolResult::error(format!(
                    "Stock symbol '{}' not found or API limit reached.",
                    args.symbol
                )));
            }
        };

        let data = QUOTE_FIELDS
            .iter()
            .map(|(key, field)| {
                let value = quote.get(*field).cloned().unwrap_or(serde_json::Value::Null);
                (key.to_string(), value)
            })
            .collect();
        Ok(ToolResult::structured(data))
    }
}
