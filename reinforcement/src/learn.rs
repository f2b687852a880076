use crate::engine::RecommendationEngine;
use crate::error::LedgerResult;
use serde::Serialize;

const POSITIVE_WORDS: [&str; 6] = ["good", "great", "love", "perfect", "amazing", "excellent"];
const NEGATIVE_WORDS: [&str; 6] = ["bad", "hate", "terrible", "awful", "wrong", "dislike"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral
}

/// Keyword classification of free-text feedback. Positive words win when
/// both kinds appear.
pub fn classify_feedback(feedback: &str) -> Sentiment {
    let lower = feedback.to_lowercase();
    if POSITIVE_WORDS.iter().any(|word| lower.contains(word)) {
        Sentiment::Positive
    } else if NEGATIVE_WORDS.iter().any(|word| lower.contains(word)) {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// The style of a generation prompt is its first comma-separated clause.
pub fn style_from_prompt(music_prompt: &str) -> &str {
    match music_prompt.split_once(',') {
        Some((head, _)) => head.trim(),
        None => music_prompt
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionOutcome {
    pub sentiment: Sentiment,
    pub music_style: String,
    pub summary: String,
    /// Up to three positive-weight styles after the update.
    pub recommendations: Vec<(String, f64)>
}

impl InteractionOutcome {
    pub fn render(&self) -> String {
        let mut out = self.summary.clone();
        if !self.recommendations.is_empty() {
            out.push_str("\n\nUpdated recommendations for similar contexts:");
            for (style, weight) in &self.recommendations {
                out.push_str(&format!("\n- {style}: {weight:.2}"));
            }
        }
        out
    }
}

pub(crate) async fn learn_from_interaction(
    engine: &RecommendationEngine,
    context: &str,
    environment: &str,
    music_prompt: &str,
    user_feedback: &str,
    rating: Option<f64>
) -> LedgerResult<InteractionOutcome> {
    let music_style = style_from_prompt(music_prompt);
    let sentiment = classify_feedback(user_feedback);

    let summary = match sentiment {
        Sentiment::Positive => {
            let rating = rating.unwrap_or(1.0);
            engine
                .ledger()
                .record_positive(context, environment, music_style, rating)
                .await?;
            format!(
                "Recorded positive feedback for {music_style} in {environment} (rating: \
                 {rating:?})\n\nThis pattern will be reinforced for future recommendations."
            )
        }
        Sentiment::Negative => {
            engine
                .ledger()
                .record_negative(context, environment, music_style, user_feedback)
                .await?;
            format!(
                "Recorded negative feedback for {music_style} in {environment} (reason: \
                 {user_feedback})\n\nThis pattern will be avoided in future recommendations."
            )
        }
        Sentiment::Neutral => {
            format!("Recorded interaction: {music_style} for {environment} (neutral feedback)")
        }
    };

    let recommendations = engine
        .weights(context, environment)
        .await
        .sorted()
        .into_iter()
        .take(3)
        .filter(|(_, weight)| *weight > 0.0)
        .collect();

    Ok(InteractionOutcome {
        sentiment,
        music_style: music_style.to_string(),
        summary,
        recommendations
    })
}
