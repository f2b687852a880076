//! Plain-text renderings handed back to language models as tool output.

use crate::engine::RecommendationWeights;
use crate::ledger::{LearningStats, Pattern};
use amb_core::ScoredRecord;
use std::fmt::Write;

pub fn render_weights(weights: &RecommendationWeights) -> String {
    if weights.is_empty() {
        return "No learned patterns found for this context. Using default recommendations."
            .to_string();
    }

    let mut out = String::from("Learned music recommendations (higher weight = more successful):\n");
    for (style, weight) in weights.sorted() {
        if weight > 0.0 {
            let _ = writeln!(out, "- {style}: {weight:.2}");
        } else {
            let _ = writeln!(out, "- {style}: {weight:.2} (avoid - negative feedback)");
        }
    }
    out
}

pub fn render_stats(stats: &LearningStats) -> String {
    let mut out = String::from("Reinforcement Learning Statistics:\n");
    let _ = writeln!(out, "Total interactions: {}", stats.total_interactions);
    let _ = writeln!(out, "Positive feedback: {}", stats.positive_count);
    let _ = writeln!(out, "Negative feedback: {}", stats.negative_count);
    if let Some(rate) = stats.success_rate() {
        let _ = writeln!(out, "Success rate: {rate:.1}%");
    }
    let _ = writeln!(out, "Last updated: {}", stats.last_updated.to_rfc3339());
    out
}

pub fn render_top_patterns(patterns: &[Pattern]) -> String {
    if patterns.is_empty() {
        return "No patterns learned yet. Start providing feedback to build recommendations!"
            .to_string();
    }

    let mut out = format!("Top {} Music Patterns:\n\n", patterns.len());
    for (i, pattern) in patterns.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} for {}",
            i + 1,
            pattern.music_style,
            pattern.environment
        );
        let _ = writeln!(out, "   Context: {}", pattern.context);
        let _ = writeln!(
            out,
            "   Score: {:.2} (used {} times, avg rating: {:.2})\n",
            pattern.score, pattern.count, pattern.avg_rating
        );
    }
    out
}

pub fn render_similar_patterns(context: &str, environment: &str, hits: &[ScoredRecord]) -> String {
    if hits.is_empty() {
        return format!("No similar successful patterns found for '{context}' in '{environment}'");
    }

    let field = |hit: &ScoredRecord, key: &str| -> String {
        hit.record.meta_str(key).unwrap_or("N/A").to_string()
    };

    let mut out = format!("Found {} similar successful patterns:\n\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(out, "{}. Context: {}", i + 1, field(hit, "context"));
        let _ = writeln!(out, "   Environment: {}", field(hit, "environment"));
        let _ = writeln!(out, "   Music: {}", field(hit, "music_prompt"));
        let _ = writeln!(out, "   Feedback: {}", field(hit, "user_feedback"));
        let _ = writeln!(out, "   Similarity: {:.2}", hit.similarity());
        let _ = writeln!(out, "   Date: {}\n", hit.record.created_at.to_rfc3339());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_weights_fall_back_to_defaults() {
        let text = render_weights(&RecommendationWeights::default());
        assert!(text.starts_with("No learned patterns found"));
    }

    #[test]
    fn test_negative_weights_are_flagged() {
        let mut weights = RecommendationWeights::default();
        weights.add("soft piano", 0.09);
        weights.add("drum loop", -0.5);
        let text = render_weights(&weights);
        assert!(text.contains("- soft piano: 0.09\n"));
        assert!(text.contains("- drum loop: -0.50 (avoid - negative feedback)"));
        assert!(text.find("soft piano") < text.find("drum loop"));
    }

    #[test]
    fn test_stats_include_success_rate_only_with_data() {
        let mut stats = LearningStats::default();
        assert!(!render_stats(&stats).contains("Success rate"));
        stats.total_interactions = 4;
        stats.positive_count = 3;
        stats.negative_count = 1;
        assert!(render_stats(&stats).contains("Success rate: 75.0%"));
    }
}
