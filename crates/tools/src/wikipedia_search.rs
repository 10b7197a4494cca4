//! Wikipedia search tool: MediaWiki search plus plain-text extracts.
//!
//! Network and upstream failures are reported inside the JSON payload
//! (`success: false`, `error`) rather than as a tool error, so the model
//! sees what went wrong and can rephrase.

use async_trait::async_trait;
use delve_core::error::ToolError;
use delve_core::tool::Tool;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::ToolKind;

const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const USER_AGENT: &str = "DelveResearchAgent/0.1 (https://github.com/delve-agent/delve)";
const DEFAULT_LIMIT: u64 = 5;
const MAX_LIMIT: u64 = 50;

pub struct WikipediaSearchTool {
    client: reqwest::Client,
    api_url: String,
}

impl WikipediaSearchTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: DEFAULT_API_URL.into(),
        }
    }

    /// Point the tool at another MediaWiki API endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, reqwest::Error> {
        self.client
            .get(&self.api_url)
            .query(params)
            .header("User-Agent", USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Plain-text body of a page. Failures become the returned text.
    async fn page_content(&self, title: &str) -> String {
        let params = [
            ("action", "query"),
            ("prop", "extracts"),
            ("explaintext", "1"),
            ("exsectionformat", "plain"),
            ("titles", title),
            ("format", "json"),
        ];
        match self.get_json::<ExtractResponse>(&params).await {
            Ok(resp) => extract_text(resp),
            Err(e) => {
                warn!(title, error = %e, "Failed to fetch page content");
                format!("Error fetching page content for '{title}': {e}")
            }
        }
    }

    async fn search(&self, query: &str, limit: u64) -> serde_json::Value {
        let srlimit = limit.to_string();
        let params = [
            ("action", "query"),
            ("list", "search"),
            ("srsearch", query),
            ("format", "json"),
            ("srlimit", srlimit.as_str()),
        ];

        let response: SearchResponse = match self.get_json(&params).await {
            Ok(r) => r,
            Err(e) => {
                let message = format!("Network error searching Wikipedia: {e}");
                warn!(query, error = %e, "Wikipedia search failed");
                return failure_payload(query, message);
            }
        };

        let Some(hits) = response.query.map(|q| q.search) else {
            return json!({
                "search_query": query,
                "results": [],
                "total_results": 0,
                "error": "No search results found",
            });
        };

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits.into_iter().take(limit as usize) {
            let content = self.page_content(&hit.title).await;
            results.push(SearchResult {
                title: hit.title,
                snippet: hit.snippet,
                pageid: hit.pageid,
                wordcount: hit.wordcount,
                timestamp: hit.timestamp,
                content,
            });
        }

        debug!(query, results = results.len(), "Wikipedia search complete");
        json!({
            "search_query": query,
            "total_results": results.len(),
            "results": results,
            "success": true,
        })
    }
}

fn failure_payload(query: &str, message: String) -> serde_json::Value {
    json!({
        "search_query": query,
        "results": [],
        "total_results": 0,
        "error": message,
        "success": false,
    })
}

/// Clamp a requested result count to what the search API accepts.
fn clamp_limit(requested: Option<u64>) -> u64 {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn extract_text(resp: ExtractResponse) -> String {
    resp.query
        .into_iter()
        .flat_map(|q| q.pages.into_iter())
        .find(|(id, _)| id != "-1")
        .map(|(_, page)| {
            page.extract
                .unwrap_or_else(|| "No content available".into())
        })
        .unwrap_or_else(|| "Page not found or no content available".into())
}

#[async_trait]
impl Tool for WikipediaSearchTool {
    fn name(&self) -> &str {
        ToolKind::WikipediaSearch.name()
    }

    fn description(&self) -> &str {
        "Search Wikipedia for information about a topic or query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query or topic to search for on Wikipedia"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of search results to return (default: 5)",
                    "default": 5
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let limit = clamp_limit(arguments["limit"].as_u64());

        Ok(self.search(query, limit).await)
    }
}

// --- MediaWiki API types (internal) ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    pageid: Option<u64>,
    #[serde(default)]
    wordcount: u64,
    #[serde(default)]
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct SearchResult {
    title: String,
    snippet: String,
    pageid: Option<u64>,
    wordcount: u64,
    timestamp: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: std::collections::HashMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    #[serde(default)]
    extract: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> WikipediaSearchTool {
        WikipediaSearchTool::new(reqwest::Client::new())
    }

    #[test]
    fn schema_requires_query() {
        let schema = tool().parameters_schema();
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["limit"]["default"], 5);
    }

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(clamp_limit(None), 5);
        assert_eq!(clamp_limit(Some(12)), 12);
        assert_eq!(clamp_limit(Some(500)), 50);
        assert_eq!(clamp_limit(Some(0)), 1);
    }

    #[tokio::test]
    async fn missing_query_is_invalid_arguments() {
        let err = tool().execute(json!({"limit": 3})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn unreachable_api_reports_failure_payload() {
        let tool = tool().with_api_url("http://127.0.0.1:9/w/api.php");
        let out = tool.execute(json!({"query": "Eiffel Tower"})).await.unwrap();
        assert_eq!(out["success"], false);
        assert_eq!(out["total_results"], 0);
        assert_eq!(out["search_query"], "Eiffel Tower");
        assert!(out["error"].as_str().unwrap().contains("Network error"));
    }

    #[test]
    fn parses_search_hits() {
        let raw = r#"{"batchcomplete":"","query":{"searchinfo":{"totalhits":2},"search":[
            {"ns":0,"title":"Eiffel Tower","pageid":9232,"size":100,"wordcount":8000,
             "snippet":"wrought-iron <span>lattice</span> tower","timestamp":"2025-01-01T00:00:00Z"},
            {"ns":0,"title":"Gustave Eiffel","pageid":12,"wordcount":3000}
        ]}}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        let hits = parsed.query.unwrap().search;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].pageid, Some(9232));
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn extract_skips_missing_page() {
        let found: ExtractResponse = serde_json::from_str(
            r#"{"query":{"pages":{"9232":{"pageid":9232,"title":"Eiffel Tower","extract":"The Eiffel Tower is..."}}}}"#,
        )
        .unwrap();
        assert_eq!(extract_text(found), "The Eiffel Tower is...");

        let missing: ExtractResponse =
            serde_json::from_str(r#"{"query":{"pages":{"-1":{"missing":""}}}}"#).unwrap();
        assert_eq!(extract_text(missing), "Page not found or no content available");
    }

    #[test]
    fn response_without_query_block() {
        let parsed: SearchResponse = serde_json::from_str(r#"{"batchcomplete":""}"#).unwrap();
        assert!(parsed.query.is_none());
    }
}
