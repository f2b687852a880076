//! Memory-agent tools over the semantic memory store.

use crate::context::ToolContext;
use crate::tool::{Tool, parse_params, schema_of};
use amb_core::{Metadata, ScoredRecord};
use async_trait::async_trait;
use errors::{PersistenceError, ToolError};
use memory::records::{self, MusicGenerationMemory};
use memory::{MemoryError, MemoryStore};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write;
use std::sync::Arc;

pub const ADD_MUSIC_GENERATION_MEMORY: &str = "add_music_generation_memory";

fn default_k() -> usize {
    5
}

fn default_category() -> String {
    "general".to_string()
}

fn write_failed(err: MemoryError) -> ToolError {
    ToolError::Persistence(PersistenceError::from(err))
}

fn search_failed(tool: &str, err: MemoryError) -> ToolError {
    ToolError::Backend {
        tool: tool.to_string(),
        reason: err.to_string()
    }
}

fn field<'a>(hit: &'a ScoredRecord, key: &str) -> &'a str {
    hit.record.meta_str(key).unwrap_or("N/A")
}

#[derive(Deserialize, JsonSchema)]
pub struct AddTextParams {
    /// The text to add to the vector store.
    pub text: String
}

#[derive(Deserialize, JsonSchema)]
pub struct SearchTextParams {
    /// The text to search for.
    pub text: String,
    /// Number of similar results to return.
    #[serde(default = "default_k")]
    pub k: usize
}

#[derive(Deserialize, JsonSchema)]
pub struct MusicGenerationParams {
    /// The emotional/global context used.
    pub context: String,
    /// The local environment description.
    pub environment: String,
    /// The music generation prompt used.
    pub music_prompt: String,
    #[serde(default)]
    pub user_feedback: String
}

#[derive(Deserialize, JsonSchema)]
pub struct QueryParams {
    /// Search query, e.g. "relaxing evening".
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize
}

#[derive(Deserialize, JsonSchema)]
pub struct PreferenceParams {
    /// Preference key, e.g. "music_style".
    pub key: String,
    /// Preference value, e.g. "ambient".
    pub value: String,
    #[serde(default = "default_category")]
    pub category: String
}

#[derive(Deserialize, JsonSchema)]
pub struct PreferenceSearchParams {
    pub query: String,
    /// Only return preferences in this category.
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_k")]
    pub k: usize
}

#[derive(Deserialize, JsonSchema)]
pub struct EnvironmentPatternParams {
    pub location: String,
    pub time_of_day: String,
    pub environment_description: String,
    pub preferred_music_style: String
}

#[derive(Deserialize, JsonSchema)]
pub struct EnvironmentSearchParams {
    pub query: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub time_of_day: String,
    #[serde(default = "default_k")]
    pub k: usize
}

macro_rules! memory_tool {
    ($ty:ident) => {
        pub struct $ty {
            memory: Arc<dyn MemoryStore>
        }

        impl $ty {
            pub fn new(memory: Arc<dyn MemoryStore>) -> Self {
                Self { memory }
            }
        }
    };
}

memory_tool!(AddToVectorStoreTool);
memory_tool!(SearchVectorStoreTool);
memory_tool!(AddMusicGenerationTool);
memory_tool!(SearchMusicMemoryTool);
memory_tool!(AddUserPreferenceTool);
memory_tool!(SearchPreferencesTool);
memory_tool!(AddEnvironmentPatternTool);
memory_tool!(SearchEnvironmentPatternsTool);

#[async_trait]
impl Tool for AddToVectorStoreTool {
    fn name(&self) -> &str {
        "add_to_vector_store"
    }

    fn description(&self) -> &str {
        "Store general text in the vector database"
    }

    fn input_schema(&self) -> Value {
        schema_of::<AddTextParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: AddTextParams = parse_params(params)?;
        self.memory
            .add(&p.text, Metadata::new())
            .await
            .map_err(write_failed)?;
        Ok("Text added to vector store".to_string())
    }
}

#[async_trait]
impl Tool for SearchVectorStoreTool {
    fn name(&self) -> &str {
        "search_vector_store"
    }

    fn description(&self) -> &str {
        "Search for similar text in the vector database"
    }

    fn input_schema(&self) -> Value {
        schema_of::<SearchTextParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: SearchTextParams = parse_params(params)?;
        let texts = self
            .memory
            .search(&p.text, p.k)
            .await
            .map_err(|e| search_failed(self.name(), e))?;
        serde_json::to_string(&texts).map_err(|e| ToolError::Backend {
            tool: self.name().to_string(),
            reason: e.to_string()
        })
    }
}

#[async_trait]
impl Tool for AddMusicGenerationTool {
    fn name(&self) -> &str {
        ADD_MUSIC_GENERATION_MEMORY
    }

    fn description(&self) -> &str {
        "Record a music generation with its context, environment and prompt"
    }

    fn input_schema(&self) -> Value {
        schema_of::<MusicGenerationParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: MusicGenerationParams = parse_params(params)?;
        let (text, metadata) = MusicGenerationMemory::new(
            p.context,
            p.environment.clone(),
            p.music_prompt.clone(),
            p.user_feedback
        )
        .into_entry();
        self.memory
            .add(&text, metadata)
            .await
            .map_err(write_failed)?;
        Ok(format!(
            "Recorded music generation: {} for {}",
            p.music_prompt, p.environment
        ))
    }
}

#[async_trait]
impl Tool for SearchMusicMemoryTool {
    fn name(&self) -> &str {
        "search_music_memory"
    }

    fn description(&self) -> &str {
        "Find similar music generations that worked before"
    }

    fn input_schema(&self) -> Value {
        schema_of::<QueryParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: QueryParams = parse_params(params)?;
        let hits = self
            .memory
            .search_with_score(&p.query, p.k)
            .await
            .map_err(|e| search_failed(self.name(), e))?;

        if hits.is_empty() {
            return Ok(format!("No similar music found for query: {}", p.query));
        }

        let mut out = format!(
            "Found {} similar music generations for '{}':\n\n",
            hits.len(),
            p.query
        );
        for (i, hit) in hits.iter().enumerate() {
            let _ = writeln!(out, "{}. Music: {}", i + 1, field(hit, "music_prompt"));
            let _ = writeln!(out, "   Context: {}", field(hit, "context"));
            let _ = writeln!(out, "   Environment: {}", field(hit, "environment"));
            let _ = writeln!(out, "   Similarity: {:.2}", hit.similarity());
            if let Some(feedback) = hit.record.meta_str("user_feedback")
                && !feedback.is_empty()
            {
                let _ = writeln!(out, "   Feedback: {feedback}");
            }
            let _ = writeln!(out, "   Date: {}\n", field(hit, "timestamp"));
        }
        Ok(out)
    }
}

#[async_trait]
impl Tool for AddUserPreferenceTool {
    fn name(&self) -> &str {
        "add_user_preference"
    }

    fn description(&self) -> &str {
        "Store a user preference with a category"
    }

    fn input_schema(&self) -> Value {
        schema_of::<PreferenceParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: PreferenceParams = parse_params(params)?;
        let (text, metadata) = records::user_preference(&p.key, &p.value, &p.category);
        self.memory
            .add(&text, metadata)
            .await
            .map_err(write_failed)?;
        Ok(format!(
            "Remembered preference: {} = {} in category {}",
            p.key, p.value, p.category
        ))
    }
}

#[async_trait]
impl Tool for SearchPreferencesTool {
    fn name(&self) -> &str {
        "search_preferences"
    }

    fn description(&self) -> &str {
        "Find relevant user preferences, optionally within one category"
    }

    fn input_schema(&self) -> Value {
        schema_of::<PreferenceSearchParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: PreferenceSearchParams = parse_params(params)?;
        let hits = self
            .memory
            .search_with_score(&p.query, p.k)
            .await
            .map_err(|e| search_failed(self.name(), e))?;

        if hits.is_empty() {
            return Ok(format!("No preferences found for query: {}", p.query));
        }

        let filtered: Vec<&ScoredRecord> = hits
            .iter()
            .filter(|hit| hit.record.record_type() == Some(records::TYPE_USER_PREFERENCE))
            .filter(|hit| p.category.is_empty() || hit.record.meta_str("category") == Some(p.category.as_str()))
            .collect();

        if filtered.is_empty() {
            return Ok(format!(
                "No preferences found for query: {} in category: {}",
                p.query, p.category
            ));
        }

        let mut out = format!("Found {} preferences for '{}':\n\n", filtered.len(), p.query);
        for (i, hit) in filtered.iter().enumerate() {
            let _ = writeln!(out, "{}. {}: {}", i + 1, field(hit, "key"), field(hit, "value"));
            let _ = writeln!(out, "   Category: {}", field(hit, "category"));
            let _ = writeln!(out, "   Similarity: {:.2}", hit.similarity());
            let _ = writeln!(out, "   Date: {}\n", field(hit, "timestamp"));
        }
        Ok(out)
    }
}

#[async_trait]
impl Tool for AddEnvironmentPatternTool {
    fn name(&self) -> &str {
        "add_environment_pattern"
    }

    fn description(&self) -> &str {
        "Learn from a successful environment and music combination"
    }

    fn input_schema(&self) -> Value {
        schema_of::<EnvironmentPatternParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: EnvironmentPatternParams = parse_params(params)?;
        let (text, metadata) = records::environment_pattern(
            &p.location,
            &p.time_of_day,
            &p.environment_description,
            &p.preferred_music_style
        );
        self.memory
            .add(&text, metadata)
            .await
            .map_err(write_failed)?;
        Ok(format!(
            "Learned pattern: {} works well for {} in {} at {}",
            p.preferred_music_style, p.environment_description, p.location, p.time_of_day
        ))
    }
}

#[async_trait]
impl Tool for SearchEnvironmentPatternsTool {
    fn name(&self) -> &str {
        "search_environment_patterns"
    }

    fn description(&self) -> &str {
        "Find similar environment patterns, optionally filtered by location and time of day"
    }

    fn input_schema(&self) -> Value {
        schema_of::<EnvironmentSearchParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: EnvironmentSearchParams = parse_params(params)?;
        let hits = self
            .memory
            .search_with_score(&p.query, p.k)
            .await
            .map_err(|e| search_failed(self.name(), e))?;

        let filtered: Vec<&ScoredRecord> = hits
            .iter()
            .filter(|hit| hit.record.record_type() == Some(records::TYPE_ENVIRONMENT_PATTERN))
            .filter(|hit| p.location.is_empty() || hit.record.meta_str("location") == Some(p.location.as_str()))
            .filter(|hit| {
                p.time_of_day.is_empty() || hit.record.meta_str("time_of_day") == Some(p.time_of_day.as_str())
            })
            .collect();

        if filtered.is_empty() {
            return Ok(format!("No environment patterns found for query: {}", p.query));
        }

        let mut out = format!(
            "Found {} environment patterns for '{}':\n\n",
            filtered.len(),
            p.query
        );
        for (i, hit) in filtered.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} at {}",
                i + 1,
                field(hit, "location"),
                field(hit, "time_of_day")
            );
            let _ = writeln!(out, "   Environment: {}", field(hit, "environment_description"));
            let _ = writeln!(out, "   Preferred music: {}", field(hit, "preferred_music_style"));
            let _ = writeln!(out, "   Similarity: {:.2}", hit.similarity());
            let _ = writeln!(out, "   Date: {}\n", field(hit, "timestamp"));
        }
        Ok(out)
    }
}

/// All eight memory tools, bound to one store.
pub fn memory_tools(memory: Arc<dyn MemoryStore>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(AddToVectorStoreTool::new(memory.clone())),
        Arc::new(SearchVectorStoreTool::new(memory.clone())),
        Arc::new(AddMusicGenerationTool::new(memory.clone())),
        Arc::new(SearchMusicMemoryTool::new(memory.clone())),
        Arc::new(AddUserPreferenceTool::new(memory.clone())),
        Arc::new(SearchPreferencesTool::new(memory.clone())),
        Arc::new(AddEnvironmentPatternTool::new(memory.clone())),
        Arc::new(SearchEnvironmentPatternsTool::new(memory))
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolRegistry;
    use memory::{HashingEmbeddingService, VectorMemoryStore};
    use serde_json::json;

    fn setup() -> (ToolRegistry, ToolContext) {
        let memory: Arc<dyn MemoryStore> = Arc::new(VectorMemoryStore::in_memory(Arc::new(
            HashingEmbeddingService::new(256)
        )));
        let mut registry = ToolRegistry::new();
        for tool in memory_tools(memory) {
            registry.register(tool);
        }
        let ctx = ToolContext::new(
            "s",
            crate::context::NO_IMAGE,
            Default::default(),
            Default::default(),
            std::env::temp_dir(),
            "combined_audio.wav"
        );
        (registry, ctx)
    }

    #[tokio::test]
    async fn test_eight_tools_registered() {
        let (registry, _) = setup();
        assert_eq!(registry.len(), 8);
    }

    #[tokio::test]
    async fn test_music_generation_round_trip() {
        let (registry, ctx) = setup();
        let ack = registry
            .call(
                &ctx,
                ADD_MUSIC_GENERATION_MEMORY,
                json!({
                    "context": "calm Sunday morning",
                    "environment": "sunlit kitchen",
                    "music_prompt": "acoustic guitar, birdsong"
                })
            )
            .await
            .unwrap();
        assert_eq!(
            ack,
            "Recorded music generation: acoustic guitar, birdsong for sunlit kitchen"
        );

        let found = registry
            .call(
                &ctx,
                "search_music_memory",
                json!({ "query": "sunlit kitchen morning" })
            )
            .await
            .unwrap();
        assert!(found.contains("Music: acoustic guitar, birdsong"));
        assert!(found.contains("Similarity: "));
    }

    #[tokio::test]
    async fn test_preference_search_filters_by_type_and_category() {
        let (registry, ctx) = setup();
        registry
            .call(
                &ctx,
                "add_user_preference",
                json!({ "key": "volume", "value": "low", "category": "music" })
            )
            .await
            .unwrap();
        registry
            .call(&ctx, "add_to_vector_store", json!({ "text": "volume low music" }))
            .await
            .unwrap();

        let music = registry
            .call(
                &ctx,
                "search_preferences",
                json!({ "query": "volume", "category": "music" })
            )
            .await
            .unwrap();
        assert!(music.starts_with("Found 1 preferences"));

        let other = registry
            .call(
                &ctx,
                "search_preferences",
                json!({ "query": "volume", "category": "lighting" })
            )
            .await
            .unwrap();
        assert!(other.contains("in category: lighting"));
    }

    #[tokio::test]
    async fn test_environment_pattern_filters() {
        let (registry, ctx) = setup();
        registry
            .call(
                &ctx,
                "add_environment_pattern",
                json!({
                    "location": "Honolulu, Hawaii",
                    "time_of_day": "morning",
                    "environment_description": "breezy lanai",
                    "preferred_music_style": "slack key guitar"
                })
            )
            .await
            .unwrap();

        let hit = registry
            .call(
                &ctx,
                "search_environment_patterns",
                json!({ "query": "breezy morning", "time_of_day": "morning" })
            )
            .await
            .unwrap();
        assert!(hit.contains("Preferred music: slack key guitar"));

        let miss = registry
            .call(
                &ctx,
                "search_environment_patterns",
                json!({ "query": "breezy morning", "time_of_day": "evening" })
            )
            .await
            .unwrap();
        assert!(miss.starts_with("No environment patterns found"));
    }
}
