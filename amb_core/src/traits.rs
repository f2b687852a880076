//! Opaque collaborator traits.
//!
//! The orchestration core never knows which model or service backs these;
//! any implementation honouring the signatures can be swapped in.

use crate::types::{CaptionRequest, CompletionRequest, Message, SearchHit, TrackRequest};
use async_trait::async_trait;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// `complete(prompt, tools) -> message`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Message, BoxError>;

    fn model_name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BoxError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BoxError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize;
}

/// Audio diffusion model plus the mixer that overlays finished layers.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Renders one layer and returns the encoded audio bytes.
    async fn generate(&self, request: &TrackRequest) -> Result<Vec<u8>, BoxError>;

    /// Overlays the given encoded layers into one encoded output.
    async fn mix(&self, tracks: &[Vec<u8>]) -> Result<Vec<u8>, BoxError>;
}

#[async_trait]
pub trait ImageCaptioner: Send + Sync {
    async fn caption(&self, request: &CaptionRequest) -> Result<String, BoxError>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, BoxError>;
}
