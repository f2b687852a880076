//! # Ambience Errors
//!
//! Shared error taxonomy for the ambience agent system.
//!
//! - `SessionError`: terminal failures of one supervised session
//! - `ToolError`: failures of a single tool invocation inside an agent
//! - `PersistenceError`: a durable write that did not land

use thiserror::Error;

/// A durable write (ledger document, memory index) failed.
///
/// The in-memory state that triggered the write is kept; the caller is told
/// the write did not land.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Persistence failed for {target}: {reason}")]
pub struct PersistenceError {
    pub target: String,
    pub reason: String
}

impl PersistenceError {
    pub fn new(target: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            target: target.into(),
            reason: reason.to_string()
        }
    }
}

/// Terminal failure of a session. Every variant names the failing stage or
/// artifact so the caller can report which step broke.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Upstream model error in {stage}: {reason}")]
    UpstreamModel { stage: String, reason: String },

    #[error("Tool budget exceeded in {stage}: {tool} limited to {limit} ({reason})")]
    ToolBudgetExceeded {
        stage: String,
        tool: String,
        limit: u32,
        reason: String
    },

    #[error("Persistence error in {stage}: {source_error}")]
    Persistence {
        stage: String,
        source_error: PersistenceError
    },

    #[error("Merge input missing in {stage}: {file}")]
    MergeInputMissing { stage: String, file: String },

    #[error("Malformed handoff: expected a response from {expected}, got {received}")]
    MalformedHandoff { expected: String, received: String },

    #[error("Session cancelled during {stage}")]
    Cancelled { stage: String },

    #[error("Timeout in {stage}: {operation} took longer than {timeout_ms}ms")]
    Timeout {
        stage: String,
        operation: String,
        timeout_ms: u64
    }
}

impl SessionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::UpstreamModel { .. } => "UPSTREAM_MODEL_ERROR",
            SessionError::ToolBudgetExceeded { .. } => "TOOL_BUDGET_EXCEEDED",
            SessionError::Persistence { .. } => "PERSISTENCE_ERROR",
            SessionError::MergeInputMissing { .. } => "MERGE_INPUT_MISSING",
            SessionError::MalformedHandoff { .. } => "MALFORMED_HANDOFF",
            SessionError::Cancelled { .. } => "CANCELLED",
            SessionError::Timeout { .. } => "TIMEOUT"
        }
    }

    /// The stage that failed. A malformed handoff is attributed to the
    /// agent that was expected to answer.
    pub fn stage(&self) -> &str {
        match self {
            SessionError::UpstreamModel { stage, .. }
            | SessionError::ToolBudgetExceeded { stage, .. }
            | SessionError::Persistence { stage, .. }
            | SessionError::MergeInputMissing { stage, .. }
            | SessionError::Cancelled { stage }
            | SessionError::Timeout { stage, .. } => stage,
            SessionError::MalformedHandoff { expected, .. } => expected
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SessionError::Cancelled { .. })
    }
}

/// Failure of a single tool call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Invalid input: {field} reason: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Backend error in {tool}: {reason}")]
    Backend { tool: String, reason: String },

    #[error("Budget exceeded: {tool} limited to {limit} ({reason})")]
    BudgetExceeded {
        tool: String,
        limit: u32,
        reason: String
    },

    #[error("Artifact generation failed in {tool}: {reason}")]
    Artifact { tool: String, reason: String },

    #[error("Merge input missing: {file}")]
    MergeInputMissing { file: String },

    #[error("Merge leaves out generated tracks: {}", omitted.join(", "))]
    IncompleteMerge { omitted: Vec<String> },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Cancelled")]
    Cancelled,

    #[error("Timeout: {tool} took longer than {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 }
}

impl ToolError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::InvalidInput {
            field: field.into(),
            reason: reason.into()
        }
    }

    /// Protocol-level failures end the session; everything else is handed
    /// back to the calling agent as a tool result it can react to.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ToolError::BudgetExceeded { .. }
                | ToolError::Artifact { .. }
                | ToolError::MergeInputMissing { .. }
                | ToolError::IncompleteMerge { .. }
                | ToolError::Cancelled
                | ToolError::Timeout { .. }
        )
    }

    /// Lifts a tool failure into a session failure attributed to `stage`.
    pub fn into_session_error(self, stage: &str) -> SessionError {
        let stage = stage.to_string();
        match self {
            ToolError::BudgetExceeded {
                tool,
                limit,
                reason
            } => SessionError::ToolBudgetExceeded {
                stage,
                tool,
                limit,
                reason
            },
            ToolError::MergeInputMissing { file } => SessionError::MergeInputMissing { stage, file },
            ToolError::IncompleteMerge { omitted } => SessionError::MergeInputMissing {
                stage,
                file: omitted.join(", ")
            },
            ToolError::Persistence(source_error) => SessionError::Persistence {
                stage,
                source_error
            },
            ToolError::Cancelled => SessionError::Cancelled { stage },
            ToolError::Timeout { tool, timeout_ms } => SessionError::Timeout {
                stage,
                operation: tool,
                timeout_ms
            },
            other => SessionError::UpstreamModel {
                stage,
                reason: other.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_errors_are_fatal_and_keep_their_kind() {
        let err = ToolError::BudgetExceeded {
            tool: "generate_music".to_string(),
            limit: 4,
            reason: "track budget spent".to_string()
        };
        assert!(err.is_fatal());

        let session = err.into_session_error("music_generation_agent");
        assert_eq!(session.code(), "TOOL_BUDGET_EXCEEDED");
        assert_eq!(session.stage(), "music_generation_agent");
    }

    #[test]
    fn test_incomplete_merge_is_fatal_and_names_the_tracks() {
        let err = ToolError::IncompleteMerge {
            omitted: vec!["b.wav".to_string(), "c.wav".to_string()]
        };
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "Merge leaves out generated tracks: b.wav, c.wav");

        let session = err.into_session_error("music_generation_agent");
        assert_eq!(session.code(), "MERGE_INPUT_MISSING");
        assert!(session.to_string().contains("b.wav, c.wav"));
    }

    #[test]
    fn test_backend_errors_are_absorbed() {
        let err = ToolError::Backend {
            tool: "search_the_web".to_string(),
            reason: "503".to_string()
        };
        assert!(!err.is_fatal());
        assert_eq!(
            err.into_session_error("global_context_agent").code(),
            "UPSTREAM_MODEL_ERROR"
        );
    }

    #[test]
    fn test_malformed_handoff_is_attributed_to_expected_agent() {
        let err = SessionError::MalformedHandoff {
            expected: "local_context_agent".to_string(),
            received: "<unsigned>".to_string()
        };
        assert_eq!(err.stage(), "local_context_agent");
        assert!(err.to_string().contains("local_context_agent"));
    }

    #[test]
    fn test_persistence_error_display_names_target() {
        let err = PersistenceError::new("feedback ledger", "disk full");
        assert_eq!(
            err.to_string(),
            "Persistence failed for feedback ledger: disk full"
        );
    }
}
