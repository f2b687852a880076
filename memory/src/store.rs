//! Durable vector index.
//!
//! Records are appended to `{dir}/{collection}.jsonl`, one JSON object per
//! line carrying the record and its embedding. The whole index is loaded into
//! memory on open and searched by brute-force cosine distance.

use crate::embedding::cosine_distance;
use crate::error::{MemoryError, MemoryResult};
use crate::telemetry::MemoryTelemetry;
use amb_core::{EmbeddingService, MemoryRecord, Metadata, ScoredRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Append-only semantic memory.
///
/// Individual calls are serialized by the implementation; there are no
/// cross-call transactions.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Stores `text` with `metadata` and returns the new record id.
    async fn add(&self, text: &str, metadata: Metadata) -> MemoryResult<String>;

    /// Nearest-first `(record, distance)` pairs, at most `k`.
    async fn search_with_score(&self, query: &str, k: usize) -> MemoryResult<Vec<ScoredRecord>>;

    /// Nearest-first record texts, at most `k`.
    async fn search(&self, query: &str, k: usize) -> MemoryResult<Vec<String>> {
        Ok(self
            .search_with_score(query, k)
            .await?
            .into_iter()
            .map(|scored| scored.record.text)
            .collect())
    }

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Forces buffered writes to durable storage.
    async fn flush(&self) -> MemoryResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    record: MemoryRecord,
    embedding: Vec<f32>
}

pub struct VectorMemoryStore {
    embedder: Arc<dyn EmbeddingService>,
    entries: RwLock<Vec<StoredEntry>>,
    path: Option<PathBuf>,
    telemetry: MemoryTelemetry
}

impl VectorMemoryStore {
    /// Opens (or creates) the collection file under `dir`.
    ///
    /// Lines that fail to parse, or whose embedding does not match the
    /// embedder's dimension, are skipped with a warning.
    pub async fn open(
        dir: impl AsRef<Path>,
        collection: &str,
        embedder: Arc<dyn EmbeddingService>
    ) -> MemoryResult<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| MemoryError::StorageError(format!("{}: {e}", dir.display())))?;
        let path = dir.join(format!("{collection}.jsonl"));
        let telemetry = MemoryTelemetry::new();

        let mut entries = Vec::new();
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                for (line_no, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StoredEntry>(line) {
                        Ok(entry) if entry.embedding.len() == embedder.dimension() => {
                            entries.push(entry)
                        }
                        Ok(entry) => {
                            warn!(
                                line = line_no + 1,
                                id = %entry.record.id,
                                dimension = entry.embedding.len(),
                                "skipping memory entry with mismatched embedding dimension"
                            );
                            telemetry.record_corrupt_entry();
                        }
                        Err(e) => {
                            warn!(line = line_no + 1, error = %e, "skipping corrupt memory entry");
                            telemetry.record_corrupt_entry();
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(MemoryError::StorageError(format!(
                    "{}: {e}",
                    path.display()
                )));
            }
        }

        info!(
            path = %path.display(),
            records = entries.len(),
            "Vector memory opened"
        );
        telemetry.record_store_size(entries.len());

        Ok(Self {
            embedder,
            entries: RwLock::new(entries),
            path: Some(path),
            telemetry
        })
    }

    /// A store that never touches disk.
    pub fn in_memory(embedder: Arc<dyn EmbeddingService>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
            path: None,
            telemetry: MemoryTelemetry::new()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        self.embedder
            .embed(text)
            .await
            .map_err(|e| MemoryError::EmbeddingError(e.to_string()))
    }

    async fn append_line(path: &Path, entry: &StoredEntry) -> MemoryResult<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| MemoryError::SerializationError(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| MemoryError::StorageError(format!("{}: {e}", path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| MemoryError::StorageError(format!("{}: {e}", path.display())))?;
        file.flush()
            .await
            .map_err(|e| MemoryError::StorageError(format!("{}: {e}", path.display())))?;
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for VectorMemoryStore {
    async fn add(&self, text: &str, metadata: Metadata) -> MemoryResult<String> {
        if text.trim().is_empty() {
            return Err(MemoryError::ValidationError(
                "memory text must not be empty".to_string()
            ));
        }

        let start = Instant::now();
        let embedding = match self.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                self.telemetry.record_operation_failure("add", "embedding");
                return Err(e);
            }
        };

        let entry = StoredEntry {
            record: MemoryRecord {
                id: uuid::Uuid::new_v4().to_string(),
                text: text.to_string(),
                metadata,
                created_at: chrono::Utc::now()
            },
            embedding
        };
        let id = entry.record.id.clone();

        // The write lock is held across the append so file order matches
        // index order.
        let mut entries = self.entries.write().await;
        if let Some(path) = &self.path
            && let Err(e) = Self::append_line(path, &entry).await
        {
            self.telemetry.record_operation_failure("add", "storage");
            return Err(e);
        }
        entries.push(entry);

        self.telemetry
            .record_operation_success("add", start.elapsed().as_secs_f64() * 1000.0);
        self.telemetry.record_store_size(entries.len());
        debug!(id = %id, record_type = ?entries.last().and_then(|e| e.record.record_type()), "memory record added");
        Ok(id)
    }

    async fn search_with_score(&self, query: &str, k: usize) -> MemoryResult<Vec<ScoredRecord>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let query_embedding = match self.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                self.telemetry.record_operation_failure("search", "embedding");
                return Err(e);
            }
        };

        let entries = self.entries.read().await;
        let mut scored: Vec<ScoredRecord> = entries
            .iter()
            .map(|entry| ScoredRecord {
                record: entry.record.clone(),
                distance: cosine_distance(&query_embedding, &entry.embedding)
            })
            .collect();
        drop(entries);

        // Stable sort: equal distances keep insertion order.
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);

        self.telemetry
            .record_operation_success("search", start.elapsed().as_secs_f64() * 1000.0);
        self.telemetry.record_search_results(scored.len());
        Ok(scored)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn flush(&self) -> MemoryResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.entries.write().await;
        match tokio::fs::OpenOptions::new().append(true).open(path).await {
            Ok(file) => file
                .sync_all()
                .await
                .map_err(|e| MemoryError::StorageError(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MemoryError::StorageError(format!(
                "{}: {e}",
                path.display()
            )))
        }
    }
}
