use crate::error::{MemoryError, MemoryResult, RetryConfig, with_retry};
use amb_core::{BoxError, EmbeddingService};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::Mutex;

/// Embeddings from an Ollama server (`POST /api/embeddings`).
pub struct OllamaEmbeddingService {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    cache: Mutex<lru::LruCache<String, Vec<f32>>>
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>
}

impl OllamaEmbeddingService {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration
    ) -> MemoryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MemoryError::InternalError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimension,
            cache: Mutex::new(lru::LruCache::new(
                NonZeroUsize::new(1000).unwrap_or(NonZeroUsize::MIN)
            ))
        })
    }

    async fn request(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text
            })
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(MemoryError::RateLimited(format!(
                "embedding endpoint returned {status}"
            )));
        }
        if status.is_server_error() {
            return Err(MemoryError::NetworkError(format!(
                "embedding endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(MemoryError::EmbeddingError(format!(
                "embedding endpoint returned {status}"
            )));
        }

        let body: EmbeddingResponse = response.json().await?;
        if body.embedding.len() != self.dimension {
            return Err(MemoryError::EmbeddingError(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                body.embedding.len()
            )));
        }
        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingService for OllamaEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BoxError> {
        if let Some(hit) = self.cache.lock().await.get(text) {
            return Ok(hit.clone());
        }

        let embedding = with_retry(|| self.request(text), RetryConfig::default()).await?;
        self.cache
            .lock()
            .await
            .put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_embedding_is_fetched_once_then_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "embedding": [0.1, 0.2, 0.3] }))
            )
            .expect(1)
            .mount(&server)
            .await;

        let service =
            OllamaEmbeddingService::new(server.uri(), "nomic-embed-text", 3, Duration::from_secs(5))
                .unwrap();

        let first = service.embed("quiet office").await.unwrap();
        let second = service.embed("quiet office").await.unwrap();
        assert_eq!(first, vec![0.1, 0.2, 0.3]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embedding": [0.1] }))
            )
            .mount(&server)
            .await;

        let service =
            OllamaEmbeddingService::new(server.uri(), "nomic-embed-text", 3, Duration::from_secs(5))
                .unwrap();

        assert!(service.embed("quiet office").await.is_err());
    }
}
