//! Recommendation weights per music style.
//!
//! A style's weight is the sum of three terms:
//!
//! 1. `count * avg_rating * learning_rate` for every matching positive entry
//! 2. `-count * negative_penalty` for every matching negative entry
//! 3. `similarity * memory_bonus` for every positive-feedback memory record
//!    among the top-k hits for `"{context} {environment} successful music"`
//!
//! An entry matches when its stored context and environment are each a
//! case-insensitive substring of the query value, or the other way round.

use crate::error::LedgerResult;
use crate::ledger::FeedbackLedger;
use config::FeedbackConfig;
use memory::MemoryStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightingParams {
    pub learning_rate: f64,
    pub negative_penalty: f64,
    pub memory_bonus: f64,
    pub memory_top_k: usize
}

impl Default for WeightingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            negative_penalty: 0.5,
            memory_bonus: 0.3,
            memory_top_k: 5
        }
    }
}

impl From<&FeedbackConfig> for WeightingParams {
    fn from(config: &FeedbackConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            negative_penalty: config.negative_penalty,
            memory_bonus: config.memory_bonus,
            memory_top_k: config.memory_top_k
        }
    }
}

/// Style → weight. Empty means no evidence either way, not "all zero".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationWeights(BTreeMap<String, f64>);

impl RecommendationWeights {
    pub fn add(&mut self, style: &str, delta: f64) {
        *self.0.entry(style.to_string()).or_insert(0.0) += delta;
    }

    pub fn merge(&mut self, other: &RecommendationWeights) {
        for (style, weight) in &other.0 {
            self.add(style, *weight);
        }
    }

    pub fn get(&self, style: &str) -> Option<f64> {
        self.0.get(style).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Weight descending, style ascending on ties.
    pub fn sorted(&self) -> Vec<(String, f64)> {
        let mut sorted: Vec<(String, f64)> =
            self.0.iter().map(|(s, w)| (s.clone(), *w)).collect();
        sorted.sort_by(|(sa, wa), (sb, wb)| wb.total_cmp(wa).then_with(|| sa.cmp(sb)));
        sorted
    }
}

/// Case-insensitive containment in either direction.
pub fn substring_match(stored: &str, query: &str) -> bool {
    let stored = stored.to_lowercase();
    let query = query.to_lowercase();
    query.contains(&stored) || stored.contains(&query)
}

/// Style named by a `"Successful {style} music"` prompt.
pub fn successful_style(music_prompt: &str) -> Option<&str> {
    let style = music_prompt
        .strip_prefix("Successful ")?
        .strip_suffix(" music")?
        .trim();
    (!style.is_empty()).then_some(style)
}

pub struct RecommendationEngine {
    ledger: Arc<FeedbackLedger>,
    memory: Arc<dyn MemoryStore>,
    params: WeightingParams
}

impl RecommendationEngine {
    pub fn new(
        ledger: Arc<FeedbackLedger>,
        memory: Arc<dyn MemoryStore>,
        params: WeightingParams
    ) -> Self {
        Self {
            ledger,
            memory,
            params
        }
    }

    pub fn ledger(&self) -> &Arc<FeedbackLedger> {
        &self.ledger
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    pub fn params(&self) -> WeightingParams {
        self.params
    }

    /// Merged weights for `(context, environment)`. Never fails: a memory
    /// search error drops the similarity term and is logged.
    #[instrument(skip(self))]
    pub async fn weights(&self, context: &str, environment: &str) -> RecommendationWeights {
        let mut weights = self.ledger_weights(context, environment).await;
        match self.memory_weights(context, environment).await {
            Ok(memory_weights) => weights.merge(&memory_weights),
            Err(e) => warn!(error = %e, "memory term skipped for recommendation weights")
        }
        debug!(styles = weights.len(), "recommendation weights computed");
        weights
    }

    /// Terms 1 and 2 only.
    pub async fn ledger_weights(&self, context: &str, environment: &str) -> RecommendationWeights {
        let snapshot = self.ledger.snapshot().await;
        let mut weights = RecommendationWeights::default();

        for feedback in &snapshot.positive {
            if substring_match(&feedback.context, context)
                && substring_match(&feedback.environment, environment)
            {
                weights.add(
                    &feedback.music_style,
                    feedback.count as f64 * feedback.avg_rating * self.params.learning_rate
                );
            }
        }

        for feedback in &snapshot.negative {
            if substring_match(&feedback.context, context)
                && substring_match(&feedback.environment, environment)
            {
                weights.add(
                    &feedback.music_style,
                    -(feedback.count as f64 * self.params.negative_penalty)
                );
            }
        }

        weights
    }

    /// Term 3 only.
    pub async fn memory_weights(
        &self,
        context: &str,
        environment: &str
    ) -> memory::MemoryResult<RecommendationWeights> {
        let query = format!("{context} {environment} successful music");
        let hits = self
            .memory
            .search_with_score(&query, self.params.memory_top_k)
            .await?;

        let mut weights = RecommendationWeights::default();
        for hit in &hits {
            let positive = hit
                .record
                .meta_str("user_feedback")
                .is_some_and(|f| f.starts_with("Positive feedback"));
            if !positive {
                continue;
            }
            if let Some(style) = hit.record.meta_str("music_prompt").and_then(successful_style) {
                weights.add(style, f64::from(hit.similarity()) * self.params.memory_bonus);
            }
        }
        Ok(weights)
    }

    /// Folds free-text feedback on one generation into the ledger.
    #[instrument(skip(self))]
    pub async fn learn_from_interaction(
        &self,
        context: &str,
        environment: &str,
        music_prompt: &str,
        user_feedback: &str,
        rating: Option<f64>
    ) -> LedgerResult<crate::learn::InteractionOutcome> {
        crate::learn::learn_from_interaction(
            self,
            context,
            environment,
            music_prompt,
            user_feedback,
            rating
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::{HashingEmbeddingService, VectorMemoryStore};

    fn engine() -> RecommendationEngine {
        let memory: Arc<dyn MemoryStore> = Arc::new(VectorMemoryStore::in_memory(Arc::new(
            HashingEmbeddingService::new(256)
        )));
        let ledger = Arc::new(FeedbackLedger::in_memory(memory.clone()));
        RecommendationEngine::new(ledger, memory, WeightingParams::default())
    }

    #[test]
    fn test_substring_match_is_symmetric_and_case_insensitive() {
        assert!(substring_match("Rainy", "rainy evening"));
        assert!(substring_match("rainy evening in Oslo", "RAINY EVENING"));
        assert!(!substring_match("rainy evening", "rainy afternoon"));
    }

    #[test]
    fn test_successful_style_extraction() {
        assert_eq!(successful_style("Successful soft piano music"), Some("soft piano"));
        assert_eq!(successful_style("Unsuccessful drum loop music"), None);
        assert_eq!(successful_style("Successful  music"), None);
    }

    #[test]
    fn test_sorted_breaks_ties_on_style() {
        let mut weights = RecommendationWeights::default();
        weights.add("strings", 0.2);
        weights.add("harp", 0.2);
        weights.add("drums", -0.5);
        weights.add("piano", 0.4);
        let order: Vec<String> = weights.sorted().into_iter().map(|(s, _)| s).collect();
        assert_eq!(order, vec!["piano", "harp", "strings", "drums"]);
    }

    #[tokio::test]
    async fn test_no_feedback_means_empty_weights() {
        let engine = engine();
        assert!(engine.weights("foggy harbour", "lighthouse").await.is_empty());
    }

    #[tokio::test]
    async fn test_positive_term_for_overlapping_context() {
        let engine = engine();
        engine
            .ledger()
            .record_positive("rainy evening", "quiet office", "soft piano", 0.9)
            .await
            .unwrap();

        let ledger_only = engine
            .ledger_weights("rainy evening in Seattle", "quiet office")
            .await;
        let weight = ledger_only.get("soft piano").unwrap();
        assert!((weight - 0.09).abs() < 1e-9);

        let merged = engine.weights("rainy evening in Seattle", "quiet office").await;
        assert!(merged.get("soft piano").unwrap() > 0.09);
    }

    #[tokio::test]
    async fn test_negative_term() {
        let engine = engine();
        engine
            .ledger()
            .record_negative("noisy cafe", "bright lights", "drum loop", "too jarring")
            .await
            .unwrap();

        let weights = engine.weights("noisy cafe", "bright lights").await;
        let weight = weights.get("drum loop").unwrap();
        assert!((weight + 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_disjoint_context_only_gets_memory_term() {
        let engine = engine();
        engine
            .ledger()
            .record_positive("rainy evening", "quiet office", "soft piano", 0.9)
            .await
            .unwrap();

        assert!(
            engine
                .ledger_weights("rainy afternoon", "quiet office")
                .await
                .is_empty()
        );
        let weights = engine.weights("rainy afternoon", "quiet office").await;
        let weight = weights.get("soft piano").unwrap();
        assert!(weight > 0.0 && weight <= 0.3);
    }
}
