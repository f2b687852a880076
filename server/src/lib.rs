//! # Server
//!
//! HTTP and WebSocket surface of the ambience system: blocking generation,
//! streamed sessions, learning statistics and Prometheus metrics.

pub mod bootstrap;
pub mod errors;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod ws;

pub use bootstrap::{DisabledSearch, build_state, run};
pub use errors::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
