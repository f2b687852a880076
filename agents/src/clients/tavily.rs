use super::{build_client, normalize_base};
use crate::error::{AgentError, AgentResult};
use amb_core::{BoxError, SearchHit, WebSearch};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "tavily";
pub const TAVILY_API_URL: &str = "https://api.tavily.com";

/// Web search through the Tavily API.
pub struct TavilySearch {
    client: reqwest::Client,
    base_url: String,
    api_key: String
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> AgentResult<Self> {
        Self::with_base_url(TAVILY_API_URL, api_key, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration
    ) -> AgentResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::Configuration("Tavily API key is empty".to_string()));
        }
        Ok(Self {
            client: build_client(timeout)?,
            base_url: normalize_base(base_url),
            api_key
        })
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, BoxError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&SearchRequest {
                api_key: &self.api_key,
                query,
                max_results
            })
            .send()
            .await
            .map_err(AgentError::http(SERVICE))?;
        if !response.status().is_success() {
            return Err(AgentError::from_response(SERVICE, response).await.into());
        }
        let mut reply: SearchResponse = response.json().await.map_err(AgentError::http(SERVICE))?;
        reply.results.truncate(max_results);
        Ok(reply.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_results_are_capped() {
        let server = MockServer::start().await;
        let hit = json!({ "title": "Weather", "url": "https://example.org", "content": "sunny" });
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({ "query": "Lisbon weather", "max_results": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [hit.clone(), hit.clone(), hit]
            })))
            .mount(&server)
            .await;

        let search =
            TavilySearch::with_base_url(server.uri(), "tvly-test", Duration::from_secs(5)).unwrap();
        let hits = search.search("Lisbon weather", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "sunny");
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert!(matches!(
            TavilySearch::new(" ", Duration::from_secs(1)),
            Err(AgentError::Configuration(_))
        ));
    }
}
