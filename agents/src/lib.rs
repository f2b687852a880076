//! # Ambience Agents
//!
//! The specialist agents and the control layer around them:
//! - `Tool` trait and `ToolRegistry`, with JSON schemas derived by `schemars`
//! - Per-session call budgets and the artifact workspace
//! - `Specialist`, a bounded tool-calling loop over a `LanguageModel`
//! - The five specialist configurations the supervisor hands off to
//! - HTTP clients for the model, audio, caption and search services

pub mod budget;
pub mod catalog;
pub mod clients;
pub mod context;
pub mod error;
pub mod specialist;
pub mod tool;
pub mod tools;
pub mod workspace;

pub use budget::{BudgetLimits, BudgetUsage, CallBudget};
pub use catalog::{Collaborators, SpecialistSet};
pub use clients::{HttpAudioBackend, HttpCaptioner, OllamaChatModel, TavilySearch};
pub use context::{NO_IMAGE, ToolContext};
pub use error::{AgentError, AgentResult};
pub use specialist::{Agent, AgentOutput, FinishPolicy, Specialist};
pub use tool::{Tool, ToolRegistry};
pub use workspace::ArtifactWorkspace;
