//! Streaming sessions over a WebSocket.
//!
//! The client opens `/ws` and sends one `init` frame; the server answers with
//! `status` / `token` events and closes after the terminal `done` or
//! `error`. A `cancel` frame, a close frame or a dropped connection cancels
//! the running session.

use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade}
    },
    response::Response
};
use serde::Deserialize;
use supervisor::{SessionEvent, SessionHandle, SessionRequest};
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Init {
        query: String,
        #[serde(default, rename = "imageRef", alias = "img_url")]
        image_ref: Option<String>,
        #[serde(default, alias = "user_feedback")]
        feedback: String
    },
    Cancel
}

impl ClientMessage {
    fn into_request(self) -> Option<SessionRequest> {
        match self {
            ClientMessage::Init {
                query,
                image_ref,
                feedback
            } => {
                let mut request = SessionRequest::new(query).with_feedback(feedback);
                if let Some(image_ref) = image_ref {
                    request = request.with_image(image_ref);
                }
                Some(request)
            }
            ClientMessage::Cancel => None
        }
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_session_stream(socket, state))
}

enum Step {
    Client(Option<Result<Message, axum::Error>>),
    Event(Option<SessionEvent>)
}

async fn next_event(handle: &mut Option<SessionHandle>) -> Option<SessionEvent> {
    match handle {
        Some(handle) => handle.next_event().await,
        None => std::future::pending().await
    }
}

async fn send_json(socket: &mut WebSocket, value: &impl serde::Serialize) -> bool {
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to serialize websocket frame: {e}");
            return false;
        }
    };
    socket.send(Message::Text(payload.into())).await.is_ok()
}

async fn reject(socket: &mut WebSocket, message: &str) {
    let frame = SessionEvent::Error {
        session_id: String::new(),
        stage: "session".to_string(),
        code: "INVALID_REQUEST".to_string(),
        message: message.to_string()
    };
    let _ = send_json(socket, &frame).await;
    let _ = socket.send(Message::Close(None)).await;
}

async fn handle_session_stream(mut socket: WebSocket, state: AppState) {
    let mut handle: Option<SessionHandle> = None;

    loop {
        let step = tokio::select! {
            msg = socket.recv() => Step::Client(msg),
            event = next_event(&mut handle) => Step::Event(event),
        };

        match step {
            Step::Client(Some(Ok(Message::Text(text)))) => {
                let parsed = serde_json::from_str::<ClientMessage>(text.as_str());
                match parsed {
                    Ok(ClientMessage::Cancel) => {
                        if let Some(running) = &handle {
                            info!(session_id = running.session_id(), "Cancel requested by client");
                            running.cancel();
                        }
                    }
                    Ok(init) => {
                        if handle.is_some() {
                            warn!("Ignoring second init frame on an active session");
                            continue;
                        }
                        let Some(runner) = state.runner.clone() else {
                            reject(&mut socket, "audio generation is not configured").await;
                            return;
                        };
                        let Some(request) = init.into_request() else {
                            continue;
                        };
                        if request.query.trim().is_empty() {
                            reject(&mut socket, "query must not be empty").await;
                            return;
                        }
                        let started = runner.stream(request);
                        info!(session_id = started.session_id(), "Streaming session started");
                        handle = Some(started);
                    }
                    Err(e) => {
                        reject(&mut socket, &format!("unreadable frame: {e}")).await;
                        if let Some(running) = &handle {
                            running.cancel();
                        }
                        return;
                    }
                }
            }
            Step::Client(Some(Ok(Message::Ping(payload)))) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            Step::Client(Some(Ok(Message::Close(_))) | None) => {
                info!("WebSocket closed by client");
                if let Some(running) = &handle {
                    running.cancel();
                }
                return;
            }
            Step::Client(Some(Ok(_))) => {
                debug!("Ignoring non-text websocket frame");
            }
            Step::Client(Some(Err(err))) => {
                error!("WebSocket receive error: {err}");
                if let Some(running) = &handle {
                    running.cancel();
                }
                return;
            }
            Step::Event(Some(event)) => {
                let terminal = event.is_terminal();
                if !send_json(&mut socket, &event).await {
                    info!("WebSocket client disconnected mid-session");
                    if let Some(running) = &handle {
                        running.cancel();
                    }
                    return;
                }
                if terminal {
                    let _ = socket.send(Message::Close(None)).await;
                    return;
                }
            }
            Step::Event(None) => {
                // The runner always emits a terminal event before dropping
                // its sink, so this only happens if the task died.
                warn!("Session stream ended without a terminal event");
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        }
    }
}
