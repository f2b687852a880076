use crate::context::ToolContext;
use crate::tool::{Tool, parse_params, schema_of};
use amb_core::WebSearch;
use async_trait::async_trait;
use errors::ToolError;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write;
use std::sync::Arc;

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get current time and date"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _ctx: &ToolContext, _params: Value) -> Result<String, ToolError> {
        let now = chrono::Local::now();
        Ok(format!("Current time: {}", now.format("%Y-%m-%d %H:%M:%S")))
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct SearchParams {
    /// What to search for.
    pub query: String
}

pub struct WebSearchTool {
    search: Arc<dyn WebSearch>,
    max_results: usize
}

impl WebSearchTool {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self {
            search,
            max_results: 5
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search_the_web"
    }

    fn description(&self) -> &str {
        "Search the web for information"
    }

    fn input_schema(&self) -> Value {
        schema_of::<SearchParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: SearchParams = parse_params(params)?;
        if p.query.trim().is_empty() {
            return Err(ToolError::invalid_input("query", "must not be empty"));
        }

        let hits = self
            .search
            .search(&p.query, self.max_results)
            .await
            .map_err(|e| ToolError::Backend {
                tool: self.name().to_string(),
                reason: e.to_string()
            })?;

        if hits.is_empty() {
            return Ok(format!("No web results found for: {}", p.query));
        }

        let mut out = String::new();
        for hit in hits.iter().take(self.max_results) {
            let _ = writeln!(out, "{}\n{}\n{}\n", hit.title, hit.url, hit.content);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testing::StaticSearch;

    fn ctx() -> ToolContext {
        ToolContext::new(
            "s",
            crate::context::NO_IMAGE,
            Default::default(),
            Default::default(),
            std::env::temp_dir(),
            "combined_audio.wav"
        )
    }

    #[tokio::test]
    async fn test_current_time_format() {
        let out = CurrentTimeTool.call(&ctx(), Value::Null).await.unwrap();
        assert!(out.starts_with("Current time: "));
        assert_eq!(out.len(), "Current time: 2025-01-01 00:00:00".len());
    }

    #[tokio::test]
    async fn test_search_failures_are_absorbable() {
        let tool = WebSearchTool::new(Arc::new(StaticSearch::failing("quota exceeded")));
        let err = tool
            .call(&ctx(), serde_json::json!({ "query": "weather in Oslo" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Backend { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_search_renders_hits() {
        let tool = WebSearchTool::new(Arc::new(StaticSearch::with_hit(
            "Oslo weather",
            "https://example.test/oslo",
            "Light rain, 8C"
        )));
        let out = tool
            .call(&ctx(), serde_json::json!({ "query": "weather in Oslo" }))
            .await
            .unwrap();
        assert!(out.contains("Light rain, 8C"));
    }
}
