//! # Memory System
//!
//! Semantic memory for the ambience agents: embedding services, a durable
//! append-only vector index and the typed records the agents write into it.

pub mod embedding;
pub mod error;
pub mod records;
pub mod store;
pub mod telemetry;

pub use embedding::{HashingEmbeddingService, OllamaEmbeddingService, cosine_distance};
pub use error::{MemoryError, MemoryResult, RetryConfig, with_retry};
pub use records::MusicGenerationMemory;
pub use store::{MemoryStore, VectorMemoryStore};
