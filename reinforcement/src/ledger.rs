//! Durable feedback ledger.
//!
//! The ledger is a single JSON document:
//!
//! ```json
//! {
//!   "positive_feedback": { "<context>|<environment>|<style>": { ... } },
//!   "negative_feedback": { "<context>|<environment>|<style>": { ... } },
//!   "learning_stats": { "total_interactions": 0, ... }
//! }
//! ```
//!
//! Every mutation is applied to the in-memory document and written through
//! to disk before the lock is released, so concurrent sessions reporting on
//! the same key never lose an update. A failed write keeps the mutation and
//! marks the ledger dirty; the next write (or [`FeedbackLedger::flush`])
//! persists the whole document again.

use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use errors::PersistenceError;
use memory::{MemoryStore, MusicGenerationMemory};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Composite key `context|environment|music_style`.
pub fn feedback_key(context: &str, environment: &str, music_style: &str) -> String {
    format!("{context}|{environment}|{music_style}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositiveFeedback {
    pub context: String,
    pub environment: String,
    pub music_style: String,
    pub count: u64,
    pub total_rating: f64,
    pub avg_rating: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeFeedback {
    pub context: String,
    pub environment: String,
    pub music_style: String,
    pub count: u64,
    /// Distinct, non-empty reasons in first-seen order.
    pub reasons: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStats {
    pub total_interactions: u64,
    #[serde(alias = "positive_feedback_count")]
    pub positive_count: u64,
    #[serde(alias = "negative_feedback_count")]
    pub negative_count: u64,
    pub last_updated: DateTime<Utc>
}

impl LearningStats {
    /// Percentage of interactions that were positive, if any were recorded.
    pub fn success_rate(&self) -> Option<f64> {
        (self.total_interactions > 0)
            .then(|| self.positive_count as f64 / self.total_interactions as f64 * 100.0)
    }
}

impl Default for LearningStats {
    fn default() -> Self {
        Self {
            total_interactions: 0,
            positive_count: 0,
            negative_count: 0,
            last_updated: Utc::now()
        }
    }
}

/// One row of [`FeedbackLedger::top_patterns`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub context: String,
    pub environment: String,
    pub music_style: String,
    /// `count * avg_rating`.
    pub score: f64,
    pub count: u64,
    pub avg_rating: f64
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerDocument {
    #[serde(default)]
    positive_feedback: BTreeMap<String, PositiveFeedback>,
    #[serde(default)]
    negative_feedback: BTreeMap<String, NegativeFeedback>,
    #[serde(default)]
    learning_stats: LearningStats
}

struct LedgerState {
    document: LedgerDocument,
    dirty: bool
}

/// Point-in-time copy of every feedback entry.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub positive: Vec<PositiveFeedback>,
    pub negative: Vec<NegativeFeedback>
}

pub struct FeedbackLedger {
    path: Option<PathBuf>,
    state: Mutex<LedgerState>,
    memory: Arc<dyn MemoryStore>
}

impl FeedbackLedger {
    /// Loads the ledger at `path`, starting empty when the file does not
    /// exist yet.
    pub async fn open(path: impl AsRef<Path>, memory: Arc<dyn MemoryStore>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<LedgerDocument>(&bytes)
                .map_err(|e| LedgerError::Corrupt(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerDocument::default(),
            Err(e) => {
                return Err(PersistenceError::new(
                    "feedback ledger",
                    format!("{}: {e}", path.display())
                )
                .into());
            }
        };

        info!(
            path = %path.display(),
            positive = document.positive_feedback.len(),
            negative = document.negative_feedback.len(),
            "Feedback ledger loaded"
        );

        Ok(Self {
            path: Some(path),
            state: Mutex::new(LedgerState {
                document,
                dirty: false
            }),
            memory
        })
    }

    /// A ledger that is never written to disk.
    pub fn in_memory(memory: Arc<dyn MemoryStore>) -> Self {
        Self {
            path: None,
            state: Mutex::new(LedgerState {
                document: LedgerDocument::default(),
                dirty: false
            }),
            memory
        }
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    /// Creates or updates the positive entry for the key and folds `rating`
    /// into its running average.
    ///
    /// Returns [`LedgerError::NotIndexed`] when the event was counted but
    /// could not be mirrored into memory; callers must not record it again.
    #[instrument(skip(self), fields(key = %feedback_key(context, environment, music_style)))]
    pub async fn record_positive(
        &self,
        context: &str,
        environment: &str,
        music_style: &str,
        rating: f64
    ) -> LedgerResult<PositiveFeedback> {
        if !rating.is_finite() || !(0.0..=1.0).contains(&rating) {
            return Err(LedgerError::InvalidRating(rating));
        }
        validate_style(music_style)?;

        let key = feedback_key(context, environment, music_style);
        let now = Utc::now();

        let (entry, persisted) = {
            let mut state = self.state.lock().await;
            let entry = state
                .document
                .positive_feedback
                .entry(key.clone())
                .or_insert_with(|| PositiveFeedback {
                    context: context.to_string(),
                    environment: environment.to_string(),
                    music_style: music_style.to_string(),
                    count: 0,
                    total_rating: 0.0,
                    avg_rating: 0.0,
                    first_seen: now,
                    last_seen: now
                });
            entry.count += 1;
            entry.total_rating += rating;
            entry.avg_rating = entry.total_rating / entry.count as f64;
            entry.last_seen = now;
            let entry = entry.clone();

            let stats = &mut state.document.learning_stats;
            stats.positive_count += 1;
            stats.total_interactions += 1;
            stats.last_updated = now;

            (entry, self.persist_locked(&mut state).await)
        };

        counter!("feedback_events_total", "polarity" => "positive").increment(1);
        debug!(count = entry.count, avg_rating = entry.avg_rating, "positive feedback recorded");

        let (text, metadata) = MusicGenerationMemory::new(
            context,
            environment,
            format!("Successful {music_style} music"),
            format!("Positive feedback: {rating:?}")
        )
        .into_entry();
        let indexed = self.memory.add(&text, metadata).await;

        persisted?;
        self.check_indexed(indexed, &key)?;
        Ok(entry)
    }

    /// Creates or updates the negative entry for the key. Empty and repeated
    /// reasons are not stored again. Index failures are reported as for
    /// [`FeedbackLedger::record_positive`].
    #[instrument(skip(self), fields(key = %feedback_key(context, environment, music_style)))]
    pub async fn record_negative(
        &self,
        context: &str,
        environment: &str,
        music_style: &str,
        reason: &str
    ) -> LedgerResult<NegativeFeedback> {
        validate_style(music_style)?;

        let key = feedback_key(context, environment, music_style);
        let now = Utc::now();

        let (entry, persisted) = {
            let mut state = self.state.lock().await;
            let entry = state
                .document
                .negative_feedback
                .entry(key.clone())
                .or_insert_with(|| NegativeFeedback {
                    context: context.to_string(),
                    environment: environment.to_string(),
                    music_style: music_style.to_string(),
                    count: 0,
                    reasons: Vec::new(),
                    first_seen: now,
                    last_seen: now
                });
            entry.count += 1;
            if !reason.is_empty() && !entry.reasons.iter().any(|r| r == reason) {
                entry.reasons.push(reason.to_string());
            }
            entry.last_seen = now;
            let entry = entry.clone();

            let stats = &mut state.document.learning_stats;
            stats.negative_count += 1;
            stats.total_interactions += 1;
            stats.last_updated = now;

            (entry, self.persist_locked(&mut state).await)
        };

        counter!("feedback_events_total", "polarity" => "negative").increment(1);
        debug!(count = entry.count, reasons = entry.reasons.len(), "negative feedback recorded");

        let (text, metadata) = MusicGenerationMemory::new(
            context,
            environment,
            format!("Unsuccessful {music_style} music"),
            format!("Negative feedback: {reason}")
        )
        .into_entry();
        let indexed = self.memory.add(&text, metadata).await;

        persisted?;
        self.check_indexed(indexed, &key)?;
        Ok(entry)
    }

    fn check_indexed<T>(&self, indexed: memory::MemoryResult<T>, key: &str) -> LedgerResult<()> {
        indexed.map(|_| ()).map_err(|e| {
            warn!(key, error = %e, "feedback recorded but not indexed into memory");
            LedgerError::NotIndexed {
                key: key.to_string(),
                source: PersistenceError::from(e)
            }
        })
    }

    pub async fn stats(&self) -> LearningStats {
        self.state.lock().await.document.learning_stats.clone()
    }

    /// Positive patterns ordered by `count * avg_rating` descending (key
    /// ascending on ties), at most `limit`.
    pub async fn top_patterns(&self, limit: usize) -> Vec<Pattern> {
        let state = self.state.lock().await;
        let mut ranked: Vec<(&String, Pattern)> = state
            .document
            .positive_feedback
            .iter()
            .map(|(key, feedback)| {
                (
                    key,
                    Pattern {
                        context: feedback.context.clone(),
                        environment: feedback.environment.clone(),
                        music_style: feedback.music_style.clone(),
                        score: feedback.count as f64 * feedback.avg_rating,
                        count: feedback.count,
                        avg_rating: feedback.avg_rating
                    }
                )
            })
            .collect();

        ranked.sort_by(|(ka, a), (kb, b)| b.score.total_cmp(&a.score).then_with(|| ka.cmp(kb)));
        ranked
            .into_iter()
            .take(limit)
            .map(|(_, pattern)| pattern)
            .collect()
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.lock().await;
        LedgerSnapshot {
            positive: state.document.positive_feedback.values().cloned().collect(),
            negative: state.document.negative_feedback.values().cloned().collect()
        }
    }

    pub async fn is_dirty(&self) -> bool {
        self.state.lock().await.dirty
    }

    /// Writes the document if an earlier write failed.
    pub async fn flush(&self) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        if !state.dirty {
            return Ok(());
        }
        self.persist_locked(&mut state).await?;
        Ok(())
    }

    /// Writes the whole document to a sibling temp file and renames it over
    /// the ledger. Caller holds the state lock.
    async fn persist_locked(&self, state: &mut LedgerState) -> Result<(), PersistenceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let result = write_atomically(path, &state.document).await;
        match &result {
            Ok(()) => {
                if state.dirty {
                    info!(path = %path.display(), "Feedback ledger recovered after failed write");
                }
                state.dirty = false;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Feedback ledger write failed; keeping in-memory state");
                counter!("feedback_persist_failures_total").increment(1);
                state.dirty = true;
            }
        }
        result
    }
}

fn validate_style(music_style: &str) -> LedgerResult<()> {
    if music_style.trim().is_empty() {
        return Err(LedgerError::InvalidInput(
            "music_style must not be empty".to_string()
        ));
    }
    Ok(())
}

async fn write_atomically(path: &Path, document: &LedgerDocument) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec_pretty(document)
        .map_err(|e| PersistenceError::new("feedback ledger", e))?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PersistenceError::new("feedback ledger", format!("{}: {e}", parent.display())))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| PersistenceError::new("feedback ledger", format!("{}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| PersistenceError::new("feedback ledger", format!("{}: {e}", path.display())))
}
