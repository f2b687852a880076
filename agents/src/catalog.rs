//! The five specialists and the collaborators they are built from.

use crate::specialist::{FinishPolicy, Specialist};
use crate::tool::ToolRegistry;
use crate::tools::{
    CurrentTimeTool, ImageCaptionTool, WebSearchTool, generation_tools, memory_tools,
    reinforcement_tools
};
use amb_core::{AgentName, AudioBackend, ImageCaptioner, LanguageModel, WebSearch};
use config::{AgentConfig, AgentTemperatures, GenerationConfig};
use memory::MemoryStore;
use reinforcement::RecommendationEngine;
use std::sync::Arc;
use std::time::Duration;

pub const GLOBAL_CONTEXT_POLICY: &str = "You are an autonomous agent that determines the current time and searches the web for the month, day, local and international news, and weather in a given location.

Using this information, give a simple and honest reflection of how a typical person in this location might be feeling emotionally. Focus on factors with an immediate impact on mood:
- Time of day and weather have the largest influence on daily emotional state.
- National and global news or events, only if they would noticeably affect people's mood.

Return your response in ONLY the following format:
\"People in [location] are likely feeling [feeling] because of [time and weather reason]. They could also be feeling [feeling2] because of [news or event reason].\"

Do not keep searching after you have the basic information you need.";

pub const LOCAL_CONTEXT_POLICY: &str = "You are an autonomous agent that understands the environment the user is in from the image they uploaded.

Always use get_image_caption to describe the environment. You may call it a MAXIMUM of 3 times; after an initial caption you can pass a conditioning prompt to ask for more specific details.
If no image was provided, say that no local context is available.

Return your response in ONLY the following format:
\"The environment the user is in is [environment]. There is [specific information about the environment].\"";

pub const MEMORY_POLICY: &str = "You are a memory management agent responsible for storing and retrieving information from the vector store.

Responsibilities:
- Store user preferences and settings
- Record music generation history with context
- Learn from environment patterns
- Search for similar contexts and preferences

Guidelines:
- Always use the most specific tool for the task
- When searching, use descriptive queries that capture the context
- Provide clear, structured responses about what was found or stored";

pub const REINFORCEMENT_POLICY: &str = "You are a reinforcement learning agent responsible for learning from user feedback and improving music recommendations.

Responsibilities:
- Record positive and negative feedback from users
- Provide weighted recommendations based on learned patterns
- Report learning statistics and the most successful patterns

Guidelines:
- Always record feedback when the user provides it, using learn_from_interaction
- Use get_recommendation_weights to guide music generation
- Explain learned patterns clearly and briefly";

pub const GENERATION_POLICY: &str = "You are an ambient music generation agent. Given emotional and location context, create an immersive soundscape that reflects the context and mood.
Use generate_music to produce individual track layers, then overlay_audio_files to combine them into one soundscape.

RULES:
1. Generate at most 4 tracks, one at a time.
2. Each track is one instrument or sound.
3. If a track includes a beat, it must be the only track with a beat.
4. After generating ALL tracks, call overlay_audio_files ONCE to merge them.
5. Each track lasts at most 15 seconds.
6. File names only; the output directory is handled for you.";

/// Everything needed to assemble the specialists of one process.
#[derive(Clone)]
pub struct Collaborators {
    pub model: Arc<dyn LanguageModel>,
    pub search: Arc<dyn WebSearch>,
    pub captioner: Arc<dyn ImageCaptioner>,
    pub audio: Arc<dyn AudioBackend>,
    pub memory: Arc<dyn MemoryStore>,
    pub engine: Arc<RecommendationEngine>
}

/// The specialists the supervisor hands off to, one per stage.
pub struct SpecialistSet {
    pub global: Specialist,
    pub local: Specialist,
    pub memory: Specialist,
    pub reinforcement: Specialist,
    pub generation: Specialist
}

impl SpecialistSet {
    pub fn build(
        collaborators: &Collaborators,
        temperatures: &AgentTemperatures,
        agents: &AgentConfig,
        generation: &GenerationConfig
    ) -> Self {
        let specialist = |name, policy: &str, tools: ToolRegistry, temperature| {
            Specialist::new(name, policy, tools, collaborators.model.clone())
                .with_temperature(temperature)
                .with_max_steps(agents.max_steps)
                .with_tool_timeout(Duration::from_secs(agents.tool_timeout_seconds))
        };

        let global_tools = ToolRegistry::new()
            .with(Arc::new(CurrentTimeTool))
            .with(Arc::new(WebSearchTool::new(collaborators.search.clone())));
        let local_tools =
            ToolRegistry::new().with(Arc::new(ImageCaptionTool::new(collaborators.captioner.clone())));

        Self {
            global: specialist(
                AgentName::GlobalContextAgent,
                GLOBAL_CONTEXT_POLICY,
                global_tools,
                temperatures.global_context
            ),
            local: specialist(
                AgentName::LocalContextAgent,
                LOCAL_CONTEXT_POLICY,
                local_tools,
                temperatures.local_context
            ),
            memory: specialist(
                AgentName::MemoryAgent,
                MEMORY_POLICY,
                registry(memory_tools(collaborators.memory.clone())),
                temperatures.memory
            ),
            reinforcement: specialist(
                AgentName::ReinforcementAgent,
                REINFORCEMENT_POLICY,
                registry(reinforcement_tools(collaborators.engine.clone())),
                temperatures.reinforcement
            ),
            generation: specialist(
                AgentName::MusicGenerationAgent,
                GENERATION_POLICY,
                registry(generation_tools(
                    collaborators.audio.clone(),
                    generation.max_track_seconds,
                    generation.default_track_seconds
                )),
                temperatures.generation
            )
            .with_finish(FinishPolicy::RequireMerge)
        }
    }
}

fn registry(tools: Vec<Arc<dyn crate::tool::Tool>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    registry
}
