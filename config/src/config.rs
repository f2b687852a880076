//! # Configuration Structures
//!
//! All configuration structures for the ambience agent system.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization, with per-field defaults
//!   so partial files are accepted
//! - Use `validator` for input validation

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level configuration aggregating every subsystem.
///
/// ## Usage
/// ```rust,no_run
/// use config::AppConfig;
///
/// let config = AppConfig::default();
/// println!("Ledger file: {}", config.feedback.ledger_path);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    /// Endpoints and model names of the opaque collaborators
    #[serde(default)]
    #[validate(nested)]
    pub models: ModelConfig,

    #[serde(default)]
    #[validate(nested)]
    pub memory: MemoryStoreConfig,

    /// Feedback ledger and recommendation weighting
    #[serde(default)]
    #[validate(nested)]
    pub feedback: FeedbackConfig,

    #[serde(default)]
    #[validate(nested)]
    pub generation: GenerationConfig,

    /// Specialist agent budgets and timeouts
    #[serde(default)]
    #[validate(nested)]
    pub agents: AgentConfig,

    #[serde(default)]
    pub supervisor: SupervisorConfig,

    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    #[validate(length(min = 1, max = 255))]
    pub bind_address: String,

    #[serde(default = "default_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port()
        }
    }
}

/// Sampling temperature per specialist.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct AgentTemperatures {
    #[validate(range(min = 0.0, max = 2.0))]
    pub global_context: f32,
    #[validate(range(min = 0.0, max = 2.0))]
    pub local_context: f32,
    #[validate(range(min = 0.0, max = 2.0))]
    pub memory: f32,
    #[validate(range(min = 0.0, max = 2.0))]
    pub reinforcement: f32,
    #[validate(range(min = 0.0, max = 2.0))]
    pub generation: f32
}

impl Default for AgentTemperatures {
    fn default() -> Self {
        Self {
            global_context: 0.0,
            local_context: 0.3,
            memory: 0.3,
            reinforcement: 0.2,
            generation: 0.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_llm_base_url")]
    #[validate(length(min = 1))]
    pub llm_base_url: String,

    #[serde(default = "default_llm_model")]
    #[validate(length(min = 1))]
    pub llm_model: String,

    #[serde(default)]
    #[validate(nested)]
    pub temperatures: AgentTemperatures,

    #[serde(default = "default_llm_base_url")]
    #[validate(length(min = 1))]
    pub embedding_base_url: String,

    #[serde(default = "default_embedding_model")]
    #[validate(length(min = 1))]
    pub embedding_model: String,

    #[serde(default = "default_embedding_dimension")]
    #[validate(range(min = 8, max = 8192))]
    pub embedding_dimension: usize,

    /// Base URL of the audio generation/mixing service. `None` means the
    /// server refuses to start generation sessions.
    #[serde(default)]
    pub audio_service_url: Option<String>,

    #[serde(default)]
    pub caption_service_url: Option<String>,

    /// Tavily API key for the global-context web search tool.
    #[serde(default)]
    pub search_api_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1, max = 3600))]
    pub request_timeout_seconds: u64
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "gpt-oss:20b".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_dimension() -> usize {
    768
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            llm_base_url: default_llm_base_url(),
            llm_model: default_llm_model(),
            temperatures: AgentTemperatures::default(),
            embedding_base_url: default_llm_base_url(),
            embedding_model: default_embedding_model(),
            embedding_dimension: default_embedding_dimension(),
            audio_service_url: None,
            caption_service_url: None,
            search_api_key: None,
            request_timeout_seconds: default_request_timeout()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct MemoryStoreConfig {
    #[serde(default = "default_persist_directory")]
    #[validate(length(min = 1))]
    pub persist_directory: String,

    #[serde(default = "default_collection")]
    #[validate(length(min = 1, max = 128))]
    pub collection: String,

    #[serde(default = "default_k")]
    #[validate(range(min = 1, max = 100))]
    pub default_k: usize
}

fn default_persist_directory() -> String {
    "./memory_db".to_string()
}

fn default_collection() -> String {
    "intelligent_ambience_memory".to_string()
}

fn default_k() -> usize {
    5
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            persist_directory: default_persist_directory(),
            collection: default_collection(),
            default_k: default_k()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct FeedbackConfig {
    #[serde(default = "default_ledger_path")]
    #[validate(length(min = 1))]
    pub ledger_path: String,

    /// Multiplier on `count * avg_rating` for positive evidence.
    #[serde(default = "default_learning_rate")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub learning_rate: f64,

    /// Subtracted per negative observation.
    #[serde(default = "default_negative_penalty")]
    #[validate(range(min = 0.0, max = 10.0))]
    pub negative_penalty: f64,

    /// Multiplier on similarity for positive records found in memory.
    #[serde(default = "default_memory_bonus")]
    #[validate(range(min = 0.0, max = 10.0))]
    pub memory_bonus: f64,

    #[serde(default = "default_k")]
    #[validate(range(min = 1, max = 100))]
    pub memory_top_k: usize
}

fn default_ledger_path() -> String {
    "reinforcement_feedback.json".to_string()
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_negative_penalty() -> f64 {
    0.5
}

fn default_memory_bonus() -> f64 {
    0.3
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            learning_rate: default_learning_rate(),
            negative_penalty: default_negative_penalty(),
            memory_bonus: default_memory_bonus(),
            memory_top_k: default_k()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_output_dir")]
    #[validate(length(min = 1))]
    pub output_dir: String,

    /// Hard ceiling on track-generation calls per session.
    #[serde(default = "default_max_tracks")]
    #[validate(range(min = 1, max = 4))]
    pub max_tracks: u32,

    #[serde(default = "default_max_track_seconds")]
    #[validate(range(min = 15, max = 45))]
    pub max_track_seconds: u32,

    #[serde(default = "default_track_seconds")]
    #[validate(range(min = 1, max = 45))]
    pub default_track_seconds: u32,

    #[serde(default = "default_merged_file_name")]
    #[validate(length(min = 1))]
    pub merged_file_name: String
}

fn default_output_dir() -> String {
    "generated_tracks".to_string()
}

fn default_max_tracks() -> u32 {
    4
}

fn default_max_track_seconds() -> u32 {
    15
}

fn default_track_seconds() -> u32 {
    11
}

fn default_merged_file_name() -> String {
    "combined_audio.wav".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_tracks: default_max_tracks(),
            max_track_seconds: default_max_track_seconds(),
            default_track_seconds: default_track_seconds(),
            merged_file_name: default_merged_file_name()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct AgentConfig {
    /// Hard ceiling on image-caption calls per session.
    #[serde(default = "default_max_captions")]
    #[validate(range(min = 1, max = 3))]
    pub max_captions: u32,

    /// Model round-trips one specialist may take before it must answer.
    #[serde(default = "default_max_steps")]
    #[validate(range(min = 1, max = 64))]
    pub max_steps: usize,

    #[serde(default = "default_tool_timeout")]
    #[validate(range(min = 1, max = 3600))]
    pub tool_timeout_seconds: u64
}

fn default_max_captions() -> u32 {
    3
}

fn default_max_steps() -> usize {
    12
}

fn default_tool_timeout() -> u64 {
    120
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_captions: default_max_captions(),
            max_steps: default_max_steps(),
            tool_timeout_seconds: default_tool_timeout()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupervisorConfig {
    /// Ask the reinforcement agent for learned weights on every session,
    /// not only when feedback is attached.
    #[serde(default = "default_consult_recommendations")]
    pub consult_recommendations: bool
}

fn default_consult_recommendations() -> bool {
    true
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            consult_recommendations: default_consult_recommendations()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String,

    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn validate_log_level(level: &str) -> Result<(), validator::ValidationError> {
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_log_level"))
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_enabled: default_metrics_enabled()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.generation.max_tracks, 4);
        assert_eq!(config.generation.max_track_seconds, 15);
        assert_eq!(config.agents.max_captions, 3);
        assert!((config.feedback.learning_rate - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_track_budget_above_four_is_rejected() {
        let mut config = AppConfig::default();
        config.generation.max_tracks = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_caption_budget_above_three_is_rejected() {
        let mut config = AppConfig::default();
        config.agents.max_captions = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let mut config = AppConfig::default();
        config.observability.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
