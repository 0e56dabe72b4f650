//! Weather tool: current temperature and conditions from OpenWeatherMap.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::tool::{Tool, ToolResult, parse_arguments};
use serde::Deserialize;
use tracing::debug;

pub struct WeatherTool {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl WeatherTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    location: String,
}

/// The fields we read from an OpenWeatherMap `/weather` response.
#[derive(Debug, Deserialize)]
struct CurrentWeather {
    name: String,
    main: MainReadings,
    weather: Vec<Condition>,
    sys: Sys,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct Sys {
    country: String,
}

/// Uppercase the first character, lowercase the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn not_found(location: &str) -> ToolResult {
    ToolResult::error(format!(
        "Could not fetch weather for '{location}'. Please check the location name."
    ))
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_temperature"
    }

    fn description(&self) -> &str {
        "Fetch current temperature and weather description for a given location. Uses the OpenWeatherMap API."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City name, optionally with a country code, e.g. 'Paris' or 'Pune,IN'"
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: WeatherArgs = parse_arguments(self.name(), arguments)?;
        let url = format!("{}/weather", self.base_url);

        let request = self.client.get(&url).query(&[
            ("q", args.location.as_str()),
            ("appid", self.api_key.as_str()),
            ("units", "metric"),
        ]);
        let (status, body) = crate::http::get_json(self.name(), request).await?;

        if !status.is_success() || body.get("main").is_none() {
            debug!(location = %args.location, %status, "Weather lookup failed");
            return Ok(not_found(&args.location));
        }

        let Ok(current) = serde_json::from_value::<CurrentWeather>(body) else {
            return Ok(not_found(&args.location));
        };
        let Some(condition) = current.weather.first() else {
            return Ok(not_found(&args.location));
        };

        let mut data = serde_json::Map::new();
        data.insert(
            "location".into(),
            format!("{}, {}", current.name, current.sys.country).into(),
        );
        data.insert("temperature (°C)".into(), current.main.temp.into());
        data.insert("condition".into(), capitalize(&condition.description).into());
        Ok(ToolResult::structured(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool(server: &MockServer) -> WeatherTool {
        let client = crate::http::build_client(Duration::from_secs(5)).unwrap();
        WeatherTool::new(client, server.uri(), "ow-test")
    }

    #[test]
    fn capitalize_matches_sentence_case() {
        assert_eq!(capitalize("light RAIN"), "Light rain");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test]
    async fn lookup_normalizes_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Tokyo"))
            .and(query_param("appid", "ow-test"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Tokyo",
                "main": {"temp": 21.4, "humidity": 60},
                "weather": [{"main": "Clouds", "description": "broken clouds"}],
                "sys": {"country": "JP"}
            })))
            .mount(&server)
            .await;

        let result = tool(&server)
            .execute(serde_json::json!({"location": "Tokyo"}))
            .await
            .unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["location"], "Tokyo, JP");
        assert_eq!(data["temperature (°C)"], 21.4);
        assert_eq!(data["condition"], "Broken clouds");
    }

    #[tokio::test]
    async fn unknown_city_is_a_structured_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404", "message": "city not found"
            })))
            .mount(&server)
            .await;

        let result = tool(&server)
            .execute(serde_json::json!({"location": "Atlantis"}))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.output.contains("Atlantis"));
    }

    #[tokio::test]
    async fn missing_fields_are_a_structured_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Nowhere", "main": {"temp": 1.0}, "weather": []
            })))
            .mount(&server)
            .await;

        let result = tool(&server)
            .execute(serde_json::json!({"location": "Nowhere"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("Nowhere"));
    }

    #[tokio::test]
    async fn missing_location_is_invalid_arguments() {
        let server = MockServer::start().await;
        let err = tool(&server).execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn unreachable_provider_is_an_execution_error() {
        let client = crate::http::build_client(Duration::from_secs(2)).unwrap();
        let tool = WeatherTool::new(client, "http://127.0.0.1:9", "ow-test");
        let err = tool
            .execute(serde_json::json!({"location": "Oslo"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
