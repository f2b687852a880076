use super::{build_client, normalize_base};
use crate::error::{AgentError, AgentResult};
use amb_core::{AudioBackend, BoxError, TrackRequest};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "audio service";

/// Audio generation and mixing served over HTTP.
///
/// `POST {base}/generate` takes `{prompt, duration_secs, has_beat}` and
/// `POST {base}/mix` takes `{tracks}`; both answer `{audio}` with base64
/// encoded WAV bytes.
pub struct HttpAudioBackend {
    client: reqwest::Client,
    base_url: String
}

#[derive(Serialize)]
struct MixRequest {
    tracks: Vec<String>
}

#[derive(Deserialize)]
struct AudioResponse {
    audio: String
}

impl HttpAudioBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AgentResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: normalize_base(base_url)
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, route: &str, body: &B) -> AgentResult<Vec<u8>> {
        let response = self
            .client
            .post(format!("{}/{route}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(AgentError::http(SERVICE))?;
        if !response.status().is_success() {
            return Err(AgentError::from_response(SERVICE, response).await);
        }

        let reply: AudioResponse = response.json().await.map_err(AgentError::http(SERVICE))?;
        let bytes = STANDARD
            .decode(reply.audio.as_bytes())
            .map_err(|e| AgentError::invalid(SERVICE, e))?;
        if bytes.is_empty() {
            return Err(AgentError::invalid(SERVICE, "empty audio payload"));
        }
        Ok(bytes)
    }
}

#[async_trait]
impl AudioBackend for HttpAudioBackend {
    async fn generate(&self, request: &TrackRequest) -> Result<Vec<u8>, BoxError> {
        Ok(self.post("generate", request).await?)
    }

    async fn mix(&self, tracks: &[Vec<u8>]) -> Result<Vec<u8>, BoxError> {
        let body = MixRequest {
            tracks: tracks.iter().map(|t| STANDARD.encode(t)).collect()
        };
        Ok(self.post("mix", &body).await?)
    }
}
