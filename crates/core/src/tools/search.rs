//! # Web Search
//!
//! Queries SearXNG instances in order: the configured instance first, then
//! a few public ones, then a local fallback. The first instance returning
//! results wins. No backend is not an error; the result says so.

use super::{normalize_action, unknown_action, ToolCapability, ToolKind, ToolOutput};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const PUBLIC_INSTANCES: &[&str] = &[
    "https://searx.be",
    "https://search.sapti.me",
    "https://searx.tiekoetter.com",
];

const LOCAL_INSTANCE: &str = "http://localhost:8888";

#[derive(Debug, Clone, Default)]
pub struct WebSearchTool {
    instance: Option<String>,
}

impl WebSearchTool {
    pub fn new(instance: Option<String>) -> Self {
        Self { instance }
    }

    fn endpoints(&self) -> Vec<String> {
        self.instance
            .iter()
            .map(String::as_str)
            .chain(PUBLIC_INSTANCES.iter().copied())
            .chain(std::iter::once(LOCAL_INSTANCE))
            .map(|base| format!("{}/search", base.trim_end_matches('/')))
            .collect()
    }

    /// Search the web, returning up to `max_results` {title, url, snippet} entries
    pub async fn search(&self, query: &str, max_results: usize) -> serde_json::Value {
        match self.try_searxng(query, max_results).await {
            Some(results) => json!({
                "query": query,
                "source": "searxng",
                "results": results
            }),
            None => json!({
                "query": query,
                "source": "none",
                "results": [],
                "message": "No search backend available. Set SEARXNG_URL to a SearXNG instance."
            }),
        }
    }

    async fn try_searxng(&self, query: &str, max_results: usize) -> Option<Vec<serde_json::Value>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .ok()?;

        for endpoint in self.endpoints() {
            let url = format!("{}?q={}&format=json", endpoint, urlencoding::encode(query));
            let Ok(response) = client.get(&url).send().await else {
                tracing::debug!(endpoint = %endpoint, "Search instance unreachable");
                continue;
            };
            let Ok(body) = response.json::<serde_json::Value>().await else {
                continue;
            };
            if let Some(results) = body.get("results").and_then(|r| r.as_array()) {
                return Some(results.iter().take(max_results).map(summarize_result).collect());
            }
        }

        None
    }
}

fn summarize_result(result: &serde_json::Value) -> serde_json::Value {
    let field = |name: &str| result.get(name).and_then(|v| v.as_str()).unwrap_or("");
    json!({
        "title": field("title"),
        "url": field("url"),
        "snippet": field("content"),
    })
}

#[async_trait]
impl ToolCapability for WebSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WebSearch
    }

    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns result titles, URLs and snippets."
    }

    async fn run(&self, action: &str, params: &serde_json::Value) -> anyhow::Result<ToolOutput> {
        if normalize_action(action) != "search" {
            return Ok(unknown_action(action));
        }
        let Some(query) = params.get("query").and_then(|q| q.as_str()) else {
            anyhow::bail!("invalid search request: missing 'query'");
        };
        let max_results = params
            .get("max_results")
            .and_then(|m| m.as_u64())
            .unwrap_or(5) as usize;
        Ok(ToolOutput::Structured(self.search(query, max_results).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_instance_comes_first() {
        let tool = WebSearchTool::new(Some("http://searx.internal/".to_string()));
        let endpoints = tool.endpoints();
        assert_eq!(endpoints[0], "http://searx.internal/search");
        assert_eq!(endpoints.last().unwrap(), "http://localhost:8888/search");
        assert_eq!(endpoints.len(), PUBLIC_INSTANCES.len() + 2);
    }

    #[test]
    fn test_summarize_result() {
        let raw = json!({"title": "Rust", "url": "https://rust-lang.org", "content": "A language", "engine": "x"});
        let summary = summarize_result(&raw);
        assert_eq!(summary["snippet"], "A language");
        assert!(summary.get("engine").is_none());
    }

    #[tokio::test]
    async fn test_unknown_action_and_missing_query() {
        let tool = WebSearchTool::default();
        let output = tool.run("crawl", &json!({})).await.unwrap();
        assert_eq!(output.as_text(), Some("Unknown action: crawl"));

        let err = tool.run("search", &json!({})).await.unwrap_err();
        assert!(err.to_string().contains("invalid search request"));
    }
}
