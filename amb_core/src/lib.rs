//! # Ambience Core
//!
//! Shared types and traits for the ambience agent system.
//!
//! This crate provides:
//! - Conversation types (`Message`, `ToolCall`, `ToolDefinition`)
//! - Agent identities (`AgentName`)
//! - Memory record types shared by the store, the ledger and the agents
//! - The opaque collaborator traits: language model, embeddings, audio
//!   generation, image captioning and web search
//!
//! Nothing in here talks to the network or the filesystem; concrete
//! implementations live in the `memory` and `agents` crates.

pub mod traits;
pub mod types;

pub use traits::{
    AudioBackend, BoxError, EmbeddingService, ImageCaptioner, LanguageModel, WebSearch
};
pub use types::{
    AgentName, CaptionRequest, CompletionRequest, MemoryRecord, Message, Metadata,
    MetadataValue, Role, ScoredRecord, SearchHit, ToolCall, ToolDefinition, ToolInvocation,
    ToolStatus, TrackRequest
};
