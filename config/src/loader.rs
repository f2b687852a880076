//! # Environment Variable Loader
//!
//! Overlays `AMB_*` environment variables onto a configuration.
//!
//! # Variables
//! - `AMB_BIND_ADDRESS`, `AMB_PORT`
//! - `AMB_LLM_BASE_URL`, `AMB_LLM_MODEL`, `AMB_EMBEDDING_BASE_URL`,
//!   `AMB_EMBEDDING_MODEL`, `AMB_EMBEDDING_DIMENSION`
//! - `AMB_AUDIO_SERVICE_URL`, `AMB_CAPTION_SERVICE_URL`,
//!   `AMB_SEARCH_API_KEY` (falls back to `TAVILY_API_KEY`)
//! - `AMB_MEMORY_DIR`, `AMB_LEDGER_PATH`, `AMB_LEARNING_RATE`
//! - `AMB_OUTPUT_DIR`, `AMB_MAX_TRACK_SECONDS`, `AMB_TOOL_TIMEOUT_SECONDS`
//! - `AMB_CONSULT_RECOMMENDATIONS`, `AMB_LOG_LEVEL`, `AMB_METRICS_ENABLED`

use crate::config::AppConfig;
use std::env;
use tracing::debug;

/// Defaults overlaid with the environment.
pub fn load_from_env() -> AppConfig {
    let mut config = AppConfig::default();
    apply_env_overrides(&mut config);
    config
}

/// Overlays every set `AMB_*` variable onto `config`. Unparseable numeric
/// values are ignored and the previous value is kept.
pub fn apply_env_overrides(config: &mut AppConfig) {
    override_string("AMB_BIND_ADDRESS", &mut config.server.bind_address);
    override_parsed("AMB_PORT", &mut config.server.port);

    override_string("AMB_LLM_BASE_URL", &mut config.models.llm_base_url);
    override_string("AMB_LLM_MODEL", &mut config.models.llm_model);
    override_string("AMB_EMBEDDING_BASE_URL", &mut config.models.embedding_base_url);
    override_string("AMB_EMBEDDING_MODEL", &mut config.models.embedding_model);
    override_parsed(
        "AMB_EMBEDDING_DIMENSION",
        &mut config.models.embedding_dimension
    );
    override_optional("AMB_AUDIO_SERVICE_URL", &mut config.models.audio_service_url);
    override_optional(
        "AMB_CAPTION_SERVICE_URL",
        &mut config.models.caption_service_url
    );
    override_optional("TAVILY_API_KEY", &mut config.models.search_api_key);
    override_optional("AMB_SEARCH_API_KEY", &mut config.models.search_api_key);

    override_string("AMB_MEMORY_DIR", &mut config.memory.persist_directory);
    override_string("AMB_LEDGER_PATH", &mut config.feedback.ledger_path);
    override_parsed("AMB_LEARNING_RATE", &mut config.feedback.learning_rate);

    override_string("AMB_OUTPUT_DIR", &mut config.generation.output_dir);
    override_parsed(
        "AMB_MAX_TRACK_SECONDS",
        &mut config.generation.max_track_seconds
    );
    override_parsed(
        "AMB_TOOL_TIMEOUT_SECONDS",
        &mut config.agents.tool_timeout_seconds
    );
    override_parsed(
        "AMB_CONSULT_RECOMMENDATIONS",
        &mut config.supervisor.consult_recommendations
    );

    override_string("AMB_LOG_LEVEL", &mut config.observability.log_level);
    override_parsed(
        "AMB_METRICS_ENABLED",
        &mut config.observability.metrics_enabled
    );
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(value) = env::var(key) {
        debug!(key, "configuration overridden from environment");
        *target = value;
    }
}

fn override_optional(key: &str, target: &mut Option<String>) {
    if let Ok(value) = env::var(key)
        && !value.is_empty()
    {
        debug!(key, "configuration overridden from environment");
        *target = Some(value);
    }
}

fn override_parsed<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Some(value) = parse_env::<T>(key) {
        debug!(key, "configuration overridden from environment");
        *target = value;
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_overrides_defaults() {
        // SAFETY: serialised test, no other thread reads the environment.
        unsafe {
            env::set_var("AMB_PORT", "9001");
            env::set_var("AMB_LEARNING_RATE", "0.2");
            env::set_var("AMB_AUDIO_SERVICE_URL", "http://audio:7000");
        }

        let config = load_from_env();
        assert_eq!(config.server.port, 9001);
        assert!((config.feedback.learning_rate - 0.2).abs() < f64::EPSILON);
        assert_eq!(
            config.models.audio_service_url.as_deref(),
            Some("http://audio:7000")
        );

        unsafe {
            env::remove_var("AMB_PORT");
            env::remove_var("AMB_LEARNING_RATE");
            env::remove_var("AMB_AUDIO_SERVICE_URL");
        }
    }

    #[test]
    #[serial]
    fn test_unparseable_number_keeps_previous_value() {
        unsafe {
            env::set_var("AMB_PORT", "not-a-port");
        }

        let config = load_from_env();
        assert_eq!(config.server.port, 8000);

        unsafe {
            env::remove_var("AMB_PORT");
        }
    }
}
