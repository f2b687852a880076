//! Reinforcement-agent tools over the feedback ledger and weighting engine.

use crate::context::ToolContext;
use crate::tool::{Tool, parse_params, schema_of};
use async_trait::async_trait;
use errors::ToolError;
use reinforcement::{RecommendationEngine, report};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const GET_RECOMMENDATION_WEIGHTS: &str = "get_recommendation_weights";
pub const LEARN_FROM_INTERACTION: &str = "learn_from_interaction";

fn default_rating() -> f64 {
    1.0
}

fn default_limit() -> usize {
    5
}

#[derive(Deserialize, JsonSchema)]
pub struct PositiveParams {
    /// The emotional/global context that worked well.
    pub context: String,
    /// The local environment description.
    pub environment: String,
    /// The music style that was successful.
    pub music_style: String,
    /// Rating from 0.0 to 1.0.
    #[serde(default = "default_rating")]
    pub user_rating: f64
}

#[derive(Deserialize, JsonSchema)]
pub struct NegativeParams {
    pub context: String,
    pub environment: String,
    /// The music style that was unsuccessful.
    pub music_style: String,
    /// Why it did not work.
    #[serde(default)]
    pub reason: String
}

#[derive(Deserialize, JsonSchema)]
pub struct ContextParams {
    pub context: String,
    pub environment: String
}

#[derive(Deserialize, JsonSchema)]
pub struct LimitParams {
    #[serde(default = "default_limit")]
    pub limit: usize
}

#[derive(Deserialize, JsonSchema)]
pub struct SimilarParams {
    pub context: String,
    pub environment: String,
    #[serde(default = "default_limit")]
    pub limit: usize
}

#[derive(Deserialize, JsonSchema)]
pub struct InteractionParams {
    pub context: String,
    pub environment: String,
    /// The music generation prompt used.
    pub music_prompt: String,
    /// The user's free-text feedback.
    pub user_feedback: String,
    /// Optional rating from 0.0 to 1.0.
    #[serde(default)]
    pub rating: Option<f64>
}

macro_rules! engine_tool {
    ($ty:ident) => {
        pub struct $ty {
            engine: Arc<RecommendationEngine>
        }

        impl $ty {
            pub fn new(engine: Arc<RecommendationEngine>) -> Self {
                Self { engine }
            }
        }
    };
}

engine_tool!(RecordPositiveTool);
engine_tool!(RecordNegativeTool);
engine_tool!(RecommendationWeightsTool);
engine_tool!(LearningStatsTool);
engine_tool!(TopPatternsTool);
engine_tool!(SimilarPatternsTool);
engine_tool!(LearnFromInteractionTool);

#[async_trait]
impl Tool for RecordPositiveTool {
    fn name(&self) -> &str {
        "record_positive_feedback"
    }

    fn description(&self) -> &str {
        "Record positive feedback to reinforce a successful music pattern"
    }

    fn input_schema(&self) -> Value {
        schema_of::<PositiveParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: PositiveParams = parse_params(params)?;
        self.engine
            .ledger()
            .record_positive(&p.context, &p.environment, &p.music_style, p.user_rating)
            .await?;
        Ok(format!(
            "Recorded positive feedback for {} in {} (rating: {:?})",
            p.music_style, p.environment, p.user_rating
        ))
    }
}

#[async_trait]
impl Tool for RecordNegativeTool {
    fn name(&self) -> &str {
        "record_negative_feedback"
    }

    fn description(&self) -> &str {
        "Record negative feedback to avoid an unsuccessful music pattern"
    }

    fn input_schema(&self) -> Value {
        schema_of::<NegativeParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: NegativeParams = parse_params(params)?;
        self.engine
            .ledger()
            .record_negative(&p.context, &p.environment, &p.music_style, &p.reason)
            .await?;
        Ok(format!(
            "Recorded negative feedback for {} in {} (reason: {})",
            p.music_style, p.environment, p.reason
        ))
    }
}

#[async_trait]
impl Tool for RecommendationWeightsTool {
    fn name(&self) -> &str {
        GET_RECOMMENDATION_WEIGHTS
    }

    fn description(&self) -> &str {
        "Get weighted music style recommendations learned for a context and environment"
    }

    fn input_schema(&self) -> Value {
        schema_of::<ContextParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: ContextParams = parse_params(params)?;
        let weights = self.engine.weights(&p.context, &p.environment).await;
        Ok(report::render_weights(&weights))
    }
}

#[async_trait]
impl Tool for LearningStatsTool {
    fn name(&self) -> &str {
        "get_learning_stats"
    }

    fn description(&self) -> &str {
        "Get current learning statistics"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _ctx: &ToolContext, _params: Value) -> Result<String, ToolError> {
        Ok(report::render_stats(&self.engine.ledger().stats().await))
    }
}

#[async_trait]
impl Tool for TopPatternsTool {
    fn name(&self) -> &str {
        "get_top_patterns"
    }

    fn description(&self) -> &str {
        "Get the most successful music patterns"
    }

    fn input_schema(&self) -> Value {
        schema_of::<LimitParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: LimitParams = parse_params(params)?;
        let patterns = self.engine.ledger().top_patterns(p.limit).await;
        Ok(report::render_top_patterns(&patterns))
    }
}

#[async_trait]
impl Tool for SimilarPatternsTool {
    fn name(&self) -> &str {
        "search_similar_successful_patterns"
    }

    fn description(&self) -> &str {
        "Search memory for similar successful patterns"
    }

    fn input_schema(&self) -> Value {
        schema_of::<SimilarParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: SimilarParams = parse_params(params)?;
        let query = format!(
            "{} {} successful music positive feedback",
            p.context, p.environment
        );
        let hits = self
            .engine
            .memory()
            .search_with_score(&query, p.limit)
            .await
            .map_err(|e| ToolError::Backend {
                tool: self.name().to_string(),
                reason: e.to_string()
            })?;
        Ok(report::render_similar_patterns(&p.context, &p.environment, &hits))
    }
}

#[async_trait]
impl Tool for LearnFromInteractionTool {
    fn name(&self) -> &str {
        LEARN_FROM_INTERACTION
    }

    fn description(&self) -> &str {
        "Learn from a complete user interaction: classifies the feedback and updates the ledger"
    }

    fn input_schema(&self) -> Value {
        schema_of::<InteractionParams>()
    }

    async fn call(&self, _ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: InteractionParams = parse_params(params)?;
        let outcome = self
            .engine
            .learn_from_interaction(
                &p.context,
                &p.environment,
                &p.music_prompt,
                &p.user_feedback,
                p.rating
            )
            .await?;
        Ok(outcome.render())
    }
}

/// All seven reinforcement tools, bound to one engine.
pub fn reinforcement_tools(engine: Arc<RecommendationEngine>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(RecordPositiveTool::new(engine.clone())),
        Arc::new(RecordNegativeTool::new(engine.clone())),
        Arc::new(RecommendationWeightsTool::new(engine.clone())),
        Arc::new(LearningStatsTool::new(engine.clone())),
        Arc::new(TopPatternsTool::new(engine.clone())),
        Arc::new(SimilarPatternsTool::new(engine.clone())),
        Arc::new(LearnFromInteractionTool::new(engine))
    ]
}
