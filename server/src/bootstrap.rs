//! Process wiring: builds the shared store, ledger and runner from
//! [`AppConfig`], serves until a shutdown signal and flushes on the way out.

use crate::routes::router;
use crate::state::AppState;
use crate::telemetry::{init_metrics, init_tracing};
use agents::{
    Collaborators, HttpAudioBackend, HttpCaptioner, OllamaChatModel, SpecialistSet, TavilySearch
};
use amb_core::{BoxError, EmbeddingService, SearchHit, WebSearch};
use async_trait::async_trait;
use config::AppConfig;
use memory::{MemoryStore, OllamaEmbeddingService, VectorMemoryStore};
use reinforcement::{FeedbackLedger, RecommendationEngine, WeightingParams};
use std::sync::Arc;
use std::time::Duration;
use supervisor::{SessionRunner, Supervisor, SupervisorSettings};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Stand-in search used when no search API key is configured. Every query
/// fails, which the global context agent absorbs as an empty result.
pub struct DisabledSearch;

#[async_trait]
impl WebSearch for DisabledSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchHit>, BoxError> {
        Err("web search is not configured".into())
    }
}

/// Opens the store and ledger and, when the generation and captioning
/// services are configured, assembles the supervisor.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let timeout = Duration::from_secs(config.models.request_timeout_seconds);

    let embedder: Arc<dyn EmbeddingService> = Arc::new(OllamaEmbeddingService::new(
        &config.models.embedding_base_url,
        &config.models.embedding_model,
        config.models.embedding_dimension,
        timeout
    )?);
    let store: Arc<dyn MemoryStore> = Arc::new(
        VectorMemoryStore::open(
            &config.memory.persist_directory,
            &config.memory.collection,
            embedder
        )
        .await?
    );
    let ledger = Arc::new(FeedbackLedger::open(&config.feedback.ledger_path, store.clone()).await?);
    let engine = Arc::new(RecommendationEngine::new(
        ledger,
        store.clone(),
        WeightingParams::from(&config.feedback)
    ));
    info!(
        records = store.len().await,
        collection = %config.memory.collection,
        "memory store ready"
    );

    let runner = build_runner(config, store, engine.clone(), timeout)?;
    Ok(AppState::new(runner, engine))
}

fn build_runner(
    config: &AppConfig,
    memory: Arc<dyn MemoryStore>,
    engine: Arc<RecommendationEngine>,
    timeout: Duration
) -> anyhow::Result<Option<SessionRunner>> {
    let (Some(audio_url), Some(caption_url)) = (
        config.models.audio_service_url.as_deref(),
        config.models.caption_service_url.as_deref()
    ) else {
        warn!("audio or caption service url missing; generation endpoints are disabled");
        return Ok(None);
    };

    let search: Arc<dyn WebSearch> = match config.models.search_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Arc::new(TavilySearch::new(key, timeout)?),
        _ => {
            warn!("no search api key configured; global context runs without web search");
            Arc::new(DisabledSearch)
        }
    };

    let collaborators = Collaborators {
        model: Arc::new(OllamaChatModel::new(
            &config.models.llm_base_url,
            &config.models.llm_model,
            timeout
        )?),
        search,
        captioner: Arc::new(HttpCaptioner::new(caption_url, timeout)?),
        audio: Arc::new(HttpAudioBackend::new(audio_url, timeout)?),
        memory,
        engine
    };
    let specialists = SpecialistSet::build(
        &collaborators,
        &config.models.temperatures,
        &config.agents,
        &config.generation
    );
    let supervisor = Supervisor::new(specialists.into(), SupervisorSettings::from_config(config));
    Ok(Some(SessionRunner::new(Arc::new(supervisor))))
}

/// Runs the server until ctrl-c or SIGTERM, then flushes the store and
/// the ledger.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    init_tracing(&config.observability.log_level);

    let mut state = build_state(&config).await?;
    if config.observability.metrics_enabled {
        state = state.with_metrics(init_metrics()?);
    }

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "ambience server listening");

    let app = router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("flushing memory store and feedback ledger");
    state.flush().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received terminate signal, shutting down"),
    }
}
