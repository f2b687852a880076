//! Shared test fixtures for the ambience workspace.
//!
//! Provides scripted stand-ins for every opaque collaborator:
//! - `ScriptedModel`: per-agent queues of replies, tool calls and failures
//! - `FakeAudioBackend`: deterministic track bytes and an overlay that concatenates
//! - `FakeCaptioner` and `StaticSearch`
//! - `ReadOnlyMemory`: a memory store whose writes fail
//!
//! plus `TestStores`, a memory store, ledger and weighting engine rooted in a
//! temporary directory that is removed when the fixture drops.

mod fakes;
mod fixtures;

pub use fakes::*;
pub use fixtures::*;
