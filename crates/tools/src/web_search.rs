//! Web search tool: DuckDuckGo Instant Answer API.
//!
//! Returns provider-formatted text. Provider failures surface as
//! `ExecutionFailed`; the control loop turns them into error payloads.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::tool::{Tool, ToolResult, parse_arguments};
use serde::Deserialize;

pub const NO_RESULTS: &str = "No good DuckDuckGo Search Result was found";

pub struct WebSearchTool {
    client: reqwest::Client,
    base_url: String,
    region: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        region: impl Into<String>,
        max_results: usize,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            region: region.into(),
            max_results: max_results.max(1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InstantAnswer {
    heading: String,
    abstract_text: String,
    abstract_url: String,
    answer: String,
    definition: String,
    related_topics: Vec<RelatedTopic>,
}

/// A related topic is either a leaf with text or a named group of leaves.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RelatedTopic {
    text: String,
    #[serde(rename = "FirstURL")]
    first_url: String,
    topics: Vec<RelatedTopic>,
}

impl InstantAnswer {
    /// Render the answer as plain text, at most `max_results` snippets.
    fn render(&self, max_results: usize) -> String {
        let mut snippets: Vec<String> = Vec::new();

        if !self.answer.is_empty() {
            snippets.push(self.answer.clone());
        }
        if !self.abstract_text.is_empty() {
            let mut s = if self.heading.is_empty() {
                self.abstract_text.clone()
            } else {
                format!("{}: {}", self.heading, self.abstract_text)
            };
            if !self.abstract_url.is_empty() {
                s.push_str(&format!(" ({})", self.abstract_url));
            }
            snippets.push(s);
        }
        if !self.definition.is_empty() {
            snippets.push(self.definition.clone());
        }

        let leaves = self
            .related_topics
            .iter()
            .flat_map(|t| if t.topics.is_empty() { vec![t] } else { t.topics.iter().collect() })
            .filter(|t| !t.text.is_empty());
        for topic in leaves {
            if topic.first_url.is_empty() {
                snippets.push(topic.text.clone());
            } else {
                snippets.push(format!("{} ({})", topic.text, topic.first_url));
            }
        }

        snippets.truncate(max_results);
        if snippets.is_empty() {
            NO_RESULTS.to_string()
        } else {
            snippets.join("\n")
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search_tool"
    }

    fn description(&self) -> &str {
        "Search the web with DuckDuckGo. Useful for current events and general knowledge. Input should be a search query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: SearchArgs = parse_arguments(self.name(), arguments)?;

        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[
                ("q", args.query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
                ("kl", self.region.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ToolError::execution_failed(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::execution_failed(
                self.name(),
                format!("search provider returned {status}"),
            ));
        }

        // DuckDuckGo labels its JSON as javascript, so decode from text.
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::execution_failed(self.name(), e))?;
        let answer: InstantAnswer = serde_json::from_str(&body)
            .map_err(|e| ToolError::execution_failed(self.name(), format!("bad search response: {e}")))?;

        Ok(ToolResult::text(answer.render(self.max_results)))
    }
}
