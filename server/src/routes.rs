use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::{RequestTimer, Telemetry};
use crate::ws::ws_handler;
use agents::NO_IMAGE;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post}
};
use reinforcement::{LearningStats, Pattern};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use supervisor::{FinalResult, SessionRequest};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/generate", post(generate))
        .route("/stats", get(stats))
        .route("/patterns", get(patterns))
        .route("/recommendations", get(recommendations))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn default_image() -> String {
    NO_IMAGE.to_string()
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub query: String,
    #[serde(default = "default_image")]
    pub img_url: String,
    #[serde(default)]
    pub user_feedback: String
}

impl From<GenerateRequest> for SessionRequest {
    fn from(req: GenerateRequest) -> Self {
        SessionRequest::new(req.query)
            .with_image(req.img_url)
            .with_feedback(req.user_feedback)
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub message: String,
    pub result: FinalResult
}

#[instrument(skip(state, req), fields(query_len = req.query.len()))]
async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>
) -> ApiResult<Json<GenerateResponse>> {
    let timer = RequestTimer::new("generate");
    let outcome = run_generate(&state, req).await;
    if let Err(err) = &outcome {
        Telemetry::record_error("generate", &err.error_code());
    }
    timer.finish();
    outcome
}

async fn run_generate(state: &AppState, req: GenerateRequest) -> ApiResult<Json<GenerateResponse>> {
    if req.query.trim().is_empty() {
        return Err(ApiError::InvalidRequest("query must not be empty".to_string()));
    }
    let runner = state.runner.as_ref().ok_or_else(|| {
        ApiError::Unavailable("audio generation or captioning service is not configured".to_string())
    })?;

    let result = runner.submit(req.into()).await?;
    info!(session_id = %result.session_id, artifact = ?result.artifact, "generate request served");

    Ok(Json(GenerateResponse {
        success: true,
        message: "Ambient music generated successfully".to_string(),
        result
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "system": "intelligent-ambience",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "Intelligent Ambience API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "generate": "POST /generate",
            "stream": "GET /ws",
            "stats": "GET /stats",
            "patterns": "GET /patterns?limit=N",
            "recommendations": "GET /recommendations?context=&environment=",
            "health": "GET /health",
            "metrics": "GET /metrics"
        }
    }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics disabled").into_response()
    }
}

async fn stats(State(state): State<AppState>) -> Json<LearningStats> {
    Json(state.engine.ledger().stats().await)
}

#[derive(Debug, Deserialize)]
pub struct PatternsQuery {
    #[serde(default = "default_pattern_limit")]
    pub limit: usize
}

fn default_pattern_limit() -> usize {
    5
}

async fn patterns(
    State(state): State<AppState>,
    Query(params): Query<PatternsQuery>
) -> Json<Vec<Pattern>> {
    Json(state.engine.ledger().top_patterns(params.limit).await)
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    pub context: String,
    pub environment: String
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StyleWeight {
    pub style: String,
    pub weight: f64
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub context: String,
    pub environment: String,
    pub weights: Vec<StyleWeight>
}

async fn recommendations(
    State(state): State<AppState>,
    Query(params): Query<RecommendationsQuery>
) -> ApiResult<Json<RecommendationsResponse>> {
    if params.context.trim().is_empty() && params.environment.trim().is_empty() {
        warn!("recommendations requested without context or environment");
        return Err(ApiError::InvalidRequest(
            "context or environment is required".to_string()
        ));
    }

    let weights = state
        .engine
        .weights(&params.context, &params.environment)
        .await
        .sorted()
        .into_iter()
        .map(|(style, weight)| StyleWeight { style, weight })
        .collect();

    Ok(Json(RecommendationsResponse {
        context: params.context,
        environment: params.environment,
        weights
    }))
}
