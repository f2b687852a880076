use agents::{Collaborators, SpecialistSet};
use amb_core::ToolCall;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode}
};
use config::{AgentConfig, AgentTemperatures, GenerationConfig};
use serde_json::{Value, json};
use server::{AppState, router};
use std::sync::Arc;
use supervisor::{SessionRunner, Specialists, Supervisor, SupervisorSettings};
use testing::{FakeAudioBackend, FakeCaptioner, ScriptedModel, StaticSearch, TestStores};
use tower::ServiceExt;

const GENERATION: &str = "music_generation_agent";

struct TestApp {
    stores: TestStores,
    model: Arc<ScriptedModel>,
    app: Router
}

async fn test_app(with_runner: bool) -> TestApp {
    let stores = TestStores::new().await;
    let model = Arc::new(ScriptedModel::new());

    let runner = with_runner.then(|| {
        let collaborators = Collaborators {
            model: model.clone(),
            search: Arc::new(StaticSearch::empty()),
            captioner: Arc::new(FakeCaptioner::new("a desk by a window")),
            audio: Arc::new(FakeAudioBackend::new()),
            memory: stores.memory_store(),
            engine: stores.engine.clone()
        };
        let set = SpecialistSet::build(
            &collaborators,
            &AgentTemperatures::default(),
            &AgentConfig::default(),
            &GenerationConfig::default()
        );
        let mut settings = SupervisorSettings::default();
        settings.consult_recommendations = false;
        settings.output_dir = stores.output_dir();
        SessionRunner::new(Arc::new(Supervisor::new(Specialists::from(set), settings)))
    });

    let app = router(AppState::new(runner, stores.engine.clone()));
    TestApp { stores, model, app }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn script_session(model: &ScriptedModel) {
    model.push_reply("global_context_agent", "People in Oslo are likely feeling calm.");
    model.push_reply(
        "local_context_agent",
        "The environment the user is in is a home office."
    );
    model.push_reply("memory_agent", "No previous sessions.");
    model.push_tool_calls(
        GENERATION,
        vec![ToolCall::new(
            "generate_music",
            json!({ "prompt": "soft piano", "file_name": "piano", "duration": 8 })
        )]
    );
    model.push_tool_calls(
        GENERATION,
        vec![ToolCall::new(
            "overlay_audio_files",
            json!({ "file_names": ["piano.wav"] })
        )]
    );
    model.push_reply(GENERATION, "Soft piano for a quiet evening.");
}

#[tokio::test]
async fn test_health_and_listing() {
    let t = test_app(false).await;

    let (status, body) = send(&t.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["system"], "intelligent-ambience");

    let (status, body) = send(&t.app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["generate"], "POST /generate");
}

#[tokio::test]
async fn test_generate_runs_a_session() {
    let t = test_app(true).await;
    script_session(&t.model);

    let (status, body) = send(
        &t.app,
        post_json("/generate", json!({ "query": "evening in Oslo" }))
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Ambient music generated successfully");
    assert_eq!(body["result"]["description"], "Soft piano for a quiet evening.");
    assert!(
        body["result"]["artifact"]
            .as_str()
            .unwrap()
            .ends_with("combined_audio.wav")
    );
}

#[tokio::test]
async fn test_generate_reports_failed_stage() {
    let t = test_app(true).await;
    t.model.push_failure("global_context_agent", "model offline");

    let (status, body) = send(
        &t.app,
        post_json("/generate", json!({ "query": "evening in Oslo" }))
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_MODEL_ERROR");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("global_context_agent"));
}

#[tokio::test]
async fn test_generate_rejects_empty_query() {
    let t = test_app(true).await;
    let (status, body) = send(&t.app, post_json("/generate", json!({ "query": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    assert!(t.model.requests().is_empty());
}

#[tokio::test]
async fn test_generate_unavailable_without_services() {
    let t = test_app(false).await;
    let (status, body) = send(&t.app, post_json("/generate", json!({ "query": "Oslo" }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "UNAVAILABLE");
}

#[tokio::test]
async fn test_learning_endpoints_read_the_ledger() {
    let t = test_app(false).await;
    let ledger = t.stores.ledger.clone();
    ledger
        .record_positive("rainy evening", "home office", "soft piano", 0.9)
        .await
        .unwrap();
    ledger
        .record_positive("sunny morning", "kitchen", "acoustic guitar", 0.6)
        .await
        .unwrap();

    let (status, stats) = send(&t.app, get("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_interactions"], 2);
    assert_eq!(stats["positive_count"], 2);

    let (status, patterns) = send(&t.app, get("/patterns?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    let patterns = patterns.as_array().unwrap();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0]["music_style"], "soft piano");

    let (status, body) = send(
        &t.app,
        get("/recommendations?context=rainy%20evening&environment=home%20office")
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let weights = body["weights"].as_array().unwrap();
    assert_eq!(weights[0]["style"], "soft piano");
    assert!(weights[0]["weight"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_metrics_disabled_without_recorder() {
    let t = test_app(false).await;
    let response = t.app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

fn session_files(output_dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let Ok(sessions) = std::fs::read_dir(output_dir) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for session in sessions.flatten() {
        found.push(session.path());
        if let Ok(files) = std::fs::read_dir(session.path()) {
            found.extend(files.flatten().map(|f| f.path()));
        }
    }
    found
}

#[tokio::test]
async fn test_disconnected_generate_cleans_up_the_session() {
    let t = test_app(true).await;
    t.model.push_reply("global_context_agent", "People in Oslo are likely feeling calm.");
    t.model
        .push_reply("local_context_agent", "The environment the user is in is a home office.");
    t.model.push_reply("memory_agent", "No previous sessions.");
    t.model.push_tool_calls(
        GENERATION,
        vec![ToolCall::new(
            "generate_music",
            json!({ "prompt": "soft piano", "file_name": "piano" })
        )]
    );
    t.model.push_stall(GENERATION);

    let app = t.app.clone();
    let request = tokio::spawn(async move {
        app.oneshot(post_json("/generate", json!({ "query": "evening in Oslo" })))
            .await
    });

    let output_dir = t.stores.output_dir();
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !session_files(&output_dir).iter().any(|p| p.ends_with("piano.wav")) {
        assert!(std::time::Instant::now() < deadline, "track was never written");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    request.abort();

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        let leftovers = session_files(&output_dir);
        if leftovers.is_empty() {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "left behind: {leftovers:?}");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
