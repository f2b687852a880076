//! # Supervisor
//!
//! Sequences the specialist agents through a fixed handoff protocol:
//! global context, local context, memory, optional reinforcement,
//! generation, then a memory write-back. Holds the append-only
//! conversation of each session and exposes the session runner used by the
//! HTTP and WebSocket surfaces.

pub mod events;
pub mod runner;
pub mod state;
pub mod supervisor;

pub use events::{EventSink, SessionEvent};
pub use runner::{SessionHandle, SessionRunner};
pub use state::{AttributedInvocation, ConversationState, HandoffRecord, Stage};
pub use supervisor::{
    FinalResult, SessionRequest, Specialists, Supervisor, SupervisorSettings, WRITEBACK_STAGE
};
