#![allow(dead_code)]

use agents::{Collaborators, SpecialistSet};
use amb_core::ToolCall;
use config::{AgentConfig, AgentTemperatures, GenerationConfig};
use memory::MemoryStore;
use serde_json::json;
use std::sync::Arc;
use supervisor::{SessionRunner, Specialists, Supervisor, SupervisorSettings};
use testing::{FakeAudioBackend, FakeCaptioner, ScriptedModel, StaticSearch, TestStores};

pub const GLOBAL: &str = "global_context_agent";
pub const LOCAL: &str = "local_context_agent";
pub const MEMORY: &str = "memory_agent";
pub const REINFORCEMENT: &str = "reinforcement_agent";
pub const GENERATION: &str = "music_generation_agent";

pub struct Harness {
    pub stores: TestStores,
    pub model: Arc<ScriptedModel>,
    pub audio: Arc<FakeAudioBackend>,
    pub runner: SessionRunner
}

pub async fn harness(consult_recommendations: bool) -> Harness {
    harness_with_memory(consult_recommendations, TestStores::memory_store).await
}

/// A harness whose memory tools go through the store `memory` builds.
pub async fn harness_with_memory(
    consult_recommendations: bool,
    memory: impl FnOnce(&TestStores) -> Arc<dyn MemoryStore>
) -> Harness {
    let stores = TestStores::new().await;
    let model = Arc::new(ScriptedModel::new());
    let audio = Arc::new(FakeAudioBackend::new());
    let collaborators = Collaborators {
        model: model.clone(),
        search: Arc::new(StaticSearch::empty()),
        captioner: Arc::new(FakeCaptioner::new("a reading nook with a lamp")),
        audio: audio.clone(),
        memory: memory(&stores),
        engine: stores.engine.clone()
    };
    let set = SpecialistSet::build(
        &collaborators,
        &AgentTemperatures::default(),
        &AgentConfig::default(),
        &GenerationConfig::default()
    );

    let mut settings = SupervisorSettings::default();
    settings.consult_recommendations = consult_recommendations;
    settings.output_dir = stores.output_dir();

    let supervisor = Supervisor::new(Specialists::from(set), settings);
    Harness {
        stores,
        model,
        audio,
        runner: SessionRunner::new(Arc::new(supervisor))
    }
}

pub fn track(name: &str, prompt: &str) -> ToolCall {
    ToolCall::new(
        "generate_music",
        json!({ "prompt": prompt, "file_name": name, "duration": 10 })
    )
}

pub fn overlay(names: &[&str]) -> ToolCall {
    ToolCall::new("overlay_audio_files", json!({ "file_names": names }))
}

impl Harness {
    /// Scripts the three context stages with plain answers.
    pub fn script_context(&self) {
        self.model
            .push_reply(GLOBAL, "People in Oslo are likely feeling calm because of a quiet rainy evening.");
        self.model.push_reply(
            LOCAL,
            "The environment the user is in is a reading nook. There is a warm lamp."
        );
        self.model.push_reply(MEMORY, "The user previously liked soft piano.");
    }

    /// Scripts a generation of two layers followed by one merge.
    pub fn script_generation(&self) {
        self.model.push_tool_calls(
            GENERATION,
            vec![track("piano", "soft piano, slow"), track("rain", "gentle rain")]
        );
        self.model
            .push_tool_calls(GENERATION, vec![overlay(&["piano.wav", "rain.wav"])]);
        self.model
            .push_reply(GENERATION, "A slow piano over gentle rain.");
    }
}
