use memory::{HashingEmbeddingService, MemoryStore, VectorMemoryStore};
use reinforcement::{FeedbackLedger, RecommendationEngine, WeightingParams};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

pub fn unique_session_id() -> String {
    unique_id("test-session")
}

/// Embedding width used by the fixtures. Small enough to keep tests fast.
pub const TEST_EMBEDDING_DIMENSION: usize = 128;

/// A persistent memory store, feedback ledger and weighting engine sharing
/// one temporary directory.
pub struct TestStores {
    dir: TempDir,
    pub memory: Arc<VectorMemoryStore>,
    pub ledger: Arc<FeedbackLedger>,
    pub engine: Arc<RecommendationEngine>
}

impl TestStores {
    pub async fn new() -> Self {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => panic!("Failed to create fixture directory: {e}")
        };
        Self::open_in(dir).await
    }

    async fn open_in(dir: TempDir) -> Self {
        let embedder = Arc::new(HashingEmbeddingService::new(TEST_EMBEDDING_DIMENSION));
        let memory = match VectorMemoryStore::open(dir.path().join("memory"), "music_memory", embedder).await {
            Ok(store) => Arc::new(store),
            Err(e) => panic!("Failed to open fixture memory store: {e}")
        };
        let shared: Arc<dyn MemoryStore> = memory.clone();
        let ledger = match FeedbackLedger::open(dir.path().join("feedback.json"), shared.clone()).await {
            Ok(ledger) => Arc::new(ledger),
            Err(e) => panic!("Failed to open fixture ledger: {e}")
        };
        let engine = Arc::new(RecommendationEngine::new(
            ledger.clone(),
            shared,
            WeightingParams::default()
        ));
        tracing::debug!(dir = %dir.path().display(), "test stores opened");

        Self {
            dir,
            memory,
            ledger,
            engine
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where session artifacts should be written.
    pub fn output_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("generated_tracks")
    }

    pub fn memory_store(&self) -> Arc<dyn MemoryStore> {
        self.memory.clone()
    }

    /// Drops the open handles and opens the same files again.
    pub async fn reopen(self) -> Self {
        let Self { dir, .. } = self;
        Self::open_in(dir).await
    }
}
