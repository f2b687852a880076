use super::{build_client, normalize_base};
use crate::error::{AgentError, AgentResult};
use amb_core::{BoxError, CaptionRequest, ImageCaptioner};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "caption service";

/// Conditional image captioning over HTTP (`POST {base}/caption`).
pub struct HttpCaptioner {
    client: reqwest::Client,
    base_url: String
}

#[derive(Deserialize)]
struct CaptionResponse {
    caption: String
}

impl HttpCaptioner {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AgentResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: normalize_base(base_url)
        })
    }
}

#[async_trait]
impl ImageCaptioner for HttpCaptioner {
    async fn caption(&self, request: &CaptionRequest) -> Result<String, BoxError> {
        let response = self
            .client
            .post(format!("{}/caption", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(AgentError::http(SERVICE))?;
        if !response.status().is_success() {
            return Err(AgentError::from_response(SERVICE, response).await.into());
        }
        let reply: CaptionResponse = response.json().await.map_err(AgentError::http(SERVICE))?;
        Ok(reply.caption.trim().to_string())
    }
}
