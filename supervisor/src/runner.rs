//! Drives sessions through the supervisor, blocking or streamed.

use crate::events::{EventSink, SessionEvent};
use crate::supervisor::{FinalResult, SessionRequest, Supervisor};
use errors::SessionError;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};

#[derive(Clone)]
pub struct SessionRunner {
    supervisor: Arc<Supervisor>
}

impl SessionRunner {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Runs one session to completion.
    ///
    /// The session runs on its own task. Dropping the returned future
    /// cancels it, and the task still cleans up the session directory.
    pub async fn submit(&self, request: SessionRequest) -> Result<FinalResult, SessionError> {
        let session_id = new_session_id();
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();

        let runner = self.clone();
        let span = info_span!("session", session_id = %session_id);
        let task = tokio::spawn(
            async move {
                let sink = EventSink::silent(&session_id);
                runner.run(request, cancel, sink).await
            }
            .instrument(span)
        );

        let result = join_session(task).await;
        guard.disarm();
        result
    }

    /// Starts a session in the background and returns its event stream.
    pub fn stream(&self, request: SessionRequest) -> SessionHandle {
        let session_id = new_session_id();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(&session_id, tx);

        let runner = self.clone();
        let token = cancel.clone();
        let span = info_span!("session", session_id = %session_id);
        let task = tokio::spawn(async move { runner.run(request, token, sink).await }.instrument(span));

        SessionHandle {
            session_id,
            cancel,
            events: rx,
            task
        }
    }

    /// Shared core of `submit` and `stream`. Always emits exactly one
    /// terminal event and, on failure, removes whatever partial artifacts
    /// the session left behind.
    pub async fn run(
        &self,
        request: SessionRequest,
        cancel: CancellationToken,
        sink: EventSink
    ) -> Result<FinalResult, SessionError> {
        let session_id = sink.session_id().to_string();
        let ctx = self.supervisor.context(&session_id, &request.image_ref, cancel);

        counter!("sessions_started_total").increment(1);
        info!(session_id = %session_id, has_image = ctx.has_image(), has_feedback = request.has_feedback(), "session started");
        sink.status("session", "Session started");

        let result = self.supervisor.dispatch(&ctx, &request, &sink).await;
        match &result {
            Ok(done) => {
                counter!("sessions_completed_total").increment(1);
                info!(session_id = %session_id, artifact = ?done.artifact, "session finished");
                sink.emit(SessionEvent::Done {
                    session_id: session_id.clone(),
                    result: done.clone()
                });
            }
            Err(err) => {
                ctx.workspace.discard_partial().await;
                counter!("sessions_failed_total", "stage" => err.stage().to_string(), "code" => err.code())
                    .increment(1);
                error!(session_id = %session_id, stage = err.stage(), code = err.code(), error = %err, "session failed");
                sink.emit(SessionEvent::error(&session_id, err));
            }
        }
        result
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A running streamed session.
pub struct SessionHandle {
    session_id: String,
    cancel: CancellationToken,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    task: JoinHandle<Result<FinalResult, SessionError>>
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Requests cooperative cancellation. The stream still ends with its
    /// terminal event.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Drains the stream up to and including the terminal event.
    pub async fn collect(mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    /// Waits for the session task. A panicked task is reported as an
    /// upstream failure of the session itself.
    pub async fn join(self) -> Result<FinalResult, SessionError> {
        join_session(self.task).await
    }
}

async fn join_session(task: JoinHandle<Result<FinalResult, SessionError>>) -> Result<FinalResult, SessionError> {
    match task.await {
        Ok(result) => result,
        Err(e) => Err(SessionError::UpstreamModel {
            stage: "session".to_string(),
            reason: e.to_string()
        })
    }
}
