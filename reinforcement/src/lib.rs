//! # Reinforcement
//!
//! Feedback ledger and recommendation weighting.
//!
//! The [`FeedbackLedger`] is the authoritative aggregate of user feedback per
//! `(context, environment, style)`; the memory store holds a denormalised copy
//! of each event for similarity search. [`RecommendationEngine`] combines both
//! into per-style weights.

pub mod engine;
pub mod error;
pub mod learn;
pub mod ledger;
pub mod report;

pub use engine::{RecommendationEngine, RecommendationWeights, WeightingParams};
pub use error::{LedgerError, LedgerResult};
pub use learn::{InteractionOutcome, Sentiment, classify_feedback, style_from_prompt};
pub use ledger::{
    FeedbackLedger, LearningStats, LedgerSnapshot, NegativeFeedback, Pattern, PositiveFeedback,
    feedback_key
};
