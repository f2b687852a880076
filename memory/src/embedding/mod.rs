pub mod hashing;
pub mod ollama;

pub use hashing::HashingEmbeddingService;
pub use ollama::OllamaEmbeddingService;

/// Cosine distance in `[0, 2]`, clamped at 0 so identical vectors never go
/// negative through rounding. Zero vectors are maximally unrelated (1.0).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 1.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    (1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).max(0.0)
}
