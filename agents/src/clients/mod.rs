//! HTTP implementations of the collaborator traits.

pub mod audio;
pub mod caption;
pub mod ollama;
pub mod tavily;

pub use audio::HttpAudioBackend;
pub use caption::HttpCaptioner;
pub use ollama::OllamaChatModel;
pub use tavily::TavilySearch;

use crate::error::{AgentError, AgentResult};
use std::time::Duration;

fn build_client(timeout: Duration) -> AgentResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AgentError::Configuration(e.to_string()))
}

fn normalize_base(url: impl Into<String>) -> String {
    url.into().trim_end_matches('/').to_string()
}
