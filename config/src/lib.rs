//! # Configuration System
//!
//! Centralized configuration management for the ambience agent system.
//!
//! This crate provides:
//! - Configuration structures for all system components
//! - Environment variable loading (12-factor app principles)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (env > file > defaults)
//! - Configuration validation

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;

pub use config::{
    AgentConfig, AgentTemperatures, AppConfig, FeedbackConfig, GenerationConfig,
    MemoryStoreConfig, ModelConfig, ObservabilityConfig, ServerConfig, SupervisorConfig
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::{apply_env_overrides, load_from_env};
pub use precedence::{ConfigError, resolve};
pub use validator::Validate;
