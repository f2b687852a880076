use amb_core::{BoxError, EmbeddingService};
use async_trait::async_trait;
use xxhash_rust::xxh64::xxh64;

/// Deterministic, offline embedding: signed feature hashing over lowercase
/// word unigrams and bigrams, L2-normalised.
///
/// Identical texts always map to identical vectors and the mapping is stable
/// across processes, so a persisted index stays searchable after restarts.
pub struct HashingEmbeddingService {
    dimension: usize
}

impl HashingEmbeddingService {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1)
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    fn accumulate(&self, embedding: &mut [f32], feature: &str, weight: f32) {
        let hash = xxh64(feature.as_bytes(), 0);
        let index = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        embedding[index] += sign * weight;
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimension];
        let tokens = Self::tokens(text);

        for token in &tokens {
            self.accumulate(&mut embedding, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut embedding, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BoxError> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_distance;

    #[tokio::test]
    async fn test_embedding_is_deterministic_and_normalised() {
        let service = HashingEmbeddingService::new(256);

        let a = service.embed("Soft piano for a rainy evening").await.unwrap();
        let b = service.embed("soft PIANO for a rainy evening!").await.unwrap();
        assert_eq!(a.len(), 256);
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_related_texts_are_closer_than_unrelated() {
        let service = HashingEmbeddingService::new(512);

        let query = service.embed("rainy evening quiet office").await.unwrap();
        let related = service
            .embed("soft piano for quiet office with context: rainy evening")
            .await
            .unwrap();
        let unrelated = service.embed("drum loop in a noisy cafe").await.unwrap();

        assert!(cosine_distance(&query, &related) < cosine_distance(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let service = HashingEmbeddingService::new(16);
        let v = service.embed("  ...  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_mock_embedding_dimension() {
        assert_eq!(HashingEmbeddingService::new(512).dimension(), 512);
        assert_eq!(HashingEmbeddingService::new(0).dimension(), 1);
    }
}
