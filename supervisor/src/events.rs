//! Events emitted by a streaming session.

use crate::supervisor::FinalResult;
use errors::SessionError;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Wire format of the streaming channel. A stream always ends with exactly
/// one `done` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionEvent {
    Status {
        session_id: String,
        stage: String,
        message: String
    },
    Token {
        session_id: String,
        agent: String,
        content: String
    },
    Done {
        session_id: String,
        result: FinalResult
    },
    Error {
        session_id: String,
        stage: String,
        code: String,
        message: String
    }
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Done { .. } | SessionEvent::Error { .. })
    }

    pub fn error(session_id: &str, err: &SessionError) -> Self {
        let message = if err.is_cancelled() {
            "cancelled".to_string()
        } else {
            err.to_string()
        };
        SessionEvent::Error {
            session_id: session_id.to_string(),
            stage: err.stage().to_string(),
            code: err.code().to_string(),
            message
        }
    }
}

/// Sending half handed to the supervisor. Sends never block the pipeline
/// and a dropped receiver only silences the stream.
#[derive(Debug, Clone)]
pub struct EventSink {
    session_id: String,
    tx: Option<mpsc::UnboundedSender<SessionEvent>>
}

impl EventSink {
    pub fn new(session_id: &str, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            session_id: session_id.to_string(),
            tx: Some(tx)
        }
    }

    /// A sink that drops everything.
    pub fn silent(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            tx: None
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx
            && tx.send(event).is_err()
        {
            debug!(session_id = %self.session_id, "event receiver dropped");
        }
    }

    pub fn status(&self, stage: impl ToString, message: impl Into<String>) {
        self.emit(SessionEvent::Status {
            session_id: self.session_id.clone(),
            stage: stage.to_string(),
            message: message.into()
        });
    }

    pub fn token(&self, agent: impl ToString, content: impl Into<String>) {
        self.emit(SessionEvent::Token {
            session_id: self.session_id.clone(),
            agent: agent.to_string(),
            content: content.into()
        });
    }
}
