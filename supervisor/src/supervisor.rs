//! The fixed-order supervisor.
//!
//! One session walks the [`Stage`] machine front to back. Each stage hands
//! the full conversation to exactly one specialist and appends its signed
//! answer; the first failure ends the session and names the stage. There is
//! no skipping, no reordering and no retry of a failed stage.

use crate::events::EventSink;
use crate::state::{AttributedInvocation, ConversationState, HandoffRecord, Stage};
use agents::tools::ADD_MUSIC_GENERATION_MEMORY;
use agents::{Agent, BudgetLimits, NO_IMAGE, SpecialistSet, ToolContext};
use amb_core::{AgentName, Message};
use config::AppConfig;
use errors::SessionError;
use metrics::histogram;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Stage label used in errors raised by the write-back step.
pub const WRITEBACK_STAGE: &str = "memory_writeback";

/// One user request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub query: String,
    #[serde(default = "default_image_ref")]
    pub image_ref: String,
    #[serde(default)]
    pub feedback: String
}

fn default_image_ref() -> String {
    NO_IMAGE.to_string()
}

impl SessionRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            image_ref: default_image_ref(),
            feedback: String::new()
        }
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        let image_ref = image_ref.into();
        if !image_ref.trim().is_empty() {
            self.image_ref = image_ref;
        }
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = feedback.into();
        self
    }

    pub fn has_feedback(&self) -> bool {
        !self.feedback.trim().is_empty()
    }
}

/// What a successful session returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub session_id: String,
    /// Short description of the generated soundscape.
    pub description: String,
    pub artifact: Option<PathBuf>,
    /// Every message of the session, each signed by its author.
    pub messages: Vec<Message>,
    pub handoffs: Vec<HandoffRecord>,
    pub tool_calls: Vec<AttributedInvocation>
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub consult_recommendations: bool,
    pub limits: BudgetLimits,
    pub output_dir: PathBuf,
    pub merged_file_name: String
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SupervisorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            consult_recommendations: config.supervisor.consult_recommendations,
            limits: BudgetLimits::from_config(&config.generation, &config.agents),
            output_dir: PathBuf::from(&config.generation.output_dir),
            merged_file_name: config.generation.merged_file_name.clone()
        }
    }
}

/// The specialists, one per answering stage.
#[derive(Clone)]
pub struct Specialists {
    pub global: Arc<dyn Agent>,
    pub local: Arc<dyn Agent>,
    pub memory: Arc<dyn Agent>,
    pub reinforcement: Arc<dyn Agent>,
    pub generation: Arc<dyn Agent>
}

impl From<SpecialistSet> for Specialists {
    fn from(set: SpecialistSet) -> Self {
        Self {
            global: Arc::new(set.global),
            local: Arc::new(set.local),
            memory: Arc::new(set.memory),
            reinforcement: Arc::new(set.reinforcement),
            generation: Arc::new(set.generation)
        }
    }
}

impl Specialists {
    fn get(&self, name: AgentName) -> Option<&Arc<dyn Agent>> {
        match name {
            AgentName::GlobalContextAgent => Some(&self.global),
            AgentName::LocalContextAgent => Some(&self.local),
            AgentName::MemoryAgent => Some(&self.memory),
            AgentName::ReinforcementAgent => Some(&self.reinforcement),
            AgentName::MusicGenerationAgent => Some(&self.generation),
            AgentName::Supervisor => None
        }
    }
}

pub struct Supervisor {
    specialists: Specialists,
    settings: SupervisorSettings
}

impl Supervisor {
    pub fn new(specialists: Specialists, settings: SupervisorSettings) -> Self {
        Self {
            specialists,
            settings
        }
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Fresh per-session tool context: own budget, own artifact directory.
    pub fn context(&self, session_id: &str, image_ref: &str, cancel: CancellationToken) -> ToolContext {
        ToolContext::new(
            session_id,
            image_ref,
            cancel,
            self.settings.limits,
            &self.settings.output_dir,
            &self.settings.merged_file_name
        )
    }

    #[instrument(skip_all, fields(session_id = %ctx.session_id))]
    pub async fn dispatch(
        &self,
        ctx: &ToolContext,
        request: &SessionRequest,
        events: &EventSink
    ) -> Result<FinalResult, SessionError> {
        let with_reinforcement = request.has_feedback() || self.settings.consult_recommendations;
        let mut state = ConversationState::new(&request.query);
        let mut stage = Stage::AwaitGlobal;

        while stage != Stage::Done {
            if ctx.is_cancelled() {
                return Err(SessionError::Cancelled {
                    stage: stage_label(stage)
                });
            }

            let started = Instant::now();
            match stage {
                Stage::AwaitMemoryWriteback => self.write_back(ctx, &mut state, request, events).await?,
                Stage::DispatchGeneration => {
                    ensure_upstream(&state)?;
                    let instruction = instruction_for(stage, ctx, request, &state);
                    self.run_stage(ctx, &mut state, stage, instruction, events).await?;
                    if ctx.workspace.merged().is_none() {
                        return Err(SessionError::UpstreamModel {
                            stage: stage_label(stage),
                            reason: "generation finished without a merged soundscape".to_string()
                        });
                    }
                }
                _ => {
                    let instruction = instruction_for(stage, ctx, request, &state);
                    self.run_stage(ctx, &mut state, stage, instruction, events).await?;
                }
            }
            histogram!("supervisor_stage_seconds", "stage" => stage.to_string())
                .record(started.elapsed().as_secs_f64());

            stage = stage.next(with_reinforcement);
        }

        let description = state
            .latest_from(AgentName::MusicGenerationAgent)
            .unwrap_or_default()
            .trim()
            .to_string();
        info!(stages = state.completed().len(), "session complete");

        Ok(FinalResult {
            session_id: ctx.session_id.clone(),
            description,
            artifact: ctx.workspace.merged(),
            messages: state.messages().to_vec(),
            handoffs: state.handoffs().to_vec(),
            tool_calls: state.tool_calls().to_vec()
        })
    }

    async fn run_stage(
        &self,
        ctx: &ToolContext,
        state: &mut ConversationState,
        stage: Stage,
        instruction: String,
        events: &EventSink
    ) -> Result<(), SessionError> {
        let Some(target) = stage.agent() else {
            return Ok(());
        };
        let Some(agent) = self.specialists.get(target) else {
            return Err(SessionError::UpstreamModel {
                stage: stage_label(stage),
                reason: format!("no specialist registered for {target}")
            });
        };

        events.status(stage, format!("Handing off to {target}"));
        info!(stage = %stage, agent = %target, "handoff");
        let payload = state.hand_off(stage, target, instruction).payload.clone();

        let output = match agent.invoke(ctx, &payload).await {
            Ok(output) => output,
            Err(err) => {
                warn!(stage = %stage, agent = %target, code = err.code(), error = %err, "stage failed");
                return Err(err);
            }
        };

        let expected = target.to_string();
        if output.response.author() != Some(expected.as_str()) {
            let received = output.response.author().unwrap_or("<unsigned>").to_string();
            warn!(stage = %stage, expected = %expected, received = %received, "unattributable response");
            return Err(SessionError::MalformedHandoff { expected, received });
        }

        events.token(target, output.response.content.clone());
        state.complete(stage, target, output.response, output.trace);
        Ok(())
    }

    /// Persists `{context, environment, generation}` through the memory
    /// agent's own tool, without a model round-trip.
    async fn write_back(
        &self,
        ctx: &ToolContext,
        state: &mut ConversationState,
        request: &SessionRequest,
        events: &EventSink
    ) -> Result<(), SessionError> {
        events.status(Stage::AwaitMemoryWriteback, "Storing the generation in memory");

        let arguments = json!({
            "context": state.latest_from(AgentName::GlobalContextAgent).unwrap_or_default(),
            "environment": state.latest_from(AgentName::LocalContextAgent).unwrap_or_default(),
            "music_prompt": generated_prompt(state),
            "user_feedback": request.feedback
        });
        state.hand_off(
            Stage::AwaitMemoryWriteback,
            AgentName::MemoryAgent,
            "Store the new generation with its context.".to_string()
        );

        let invocation = self
            .specialists
            .memory
            .invoke_tool(ctx, ADD_MUSIC_GENERATION_MEMORY, arguments)
            .await
            .map_err(|e| {
                warn!(error = %e, "memory write-back failed");
                e.into_session_error(WRITEBACK_STAGE)
            })?;

        let response = Message::assistant(AgentName::MemoryAgent.to_string(), invocation.output.clone());
        state.complete(
            Stage::AwaitMemoryWriteback,
            AgentName::MemoryAgent,
            response,
            vec![invocation]
        );
        Ok(())
    }
}

fn stage_label(stage: Stage) -> String {
    match stage {
        Stage::AwaitMemoryWriteback => WRITEBACK_STAGE.to_string(),
        other => other
            .agent()
            .map_or_else(|| other.to_string(), |agent| agent.to_string())
    }
}

fn ensure_upstream(state: &ConversationState) -> Result<(), SessionError> {
    for required in Stage::REQUIRED_UPSTREAM {
        if !state.has_completed(required) {
            return Err(SessionError::UpstreamModel {
                stage: stage_label(Stage::DispatchGeneration),
                reason: format!("{} has not answered", stage_label(required))
            });
        }
    }
    Ok(())
}

/// The prompts of the generated layers, in order; the first layer's prompt
/// leads so that its style is what feedback later attaches to.
fn generated_prompt(state: &ConversationState) -> String {
    let prompts: Vec<&str> = state
        .tool_calls()
        .iter()
        .filter(|c| c.agent == AgentName::MusicGenerationAgent && c.invocation.tool == "generate_music")
        .filter_map(|c| c.invocation.arguments.get("prompt").and_then(|p| p.as_str()))
        .collect();
    if prompts.is_empty() {
        state
            .latest_from(AgentName::MusicGenerationAgent)
            .unwrap_or_default()
            .to_string()
    } else {
        prompts.join(", ")
    }
}

fn instruction_for(
    stage: Stage,
    ctx: &ToolContext,
    request: &SessionRequest,
    state: &ConversationState
) -> String {
    let global = state
        .latest_from(AgentName::GlobalContextAgent)
        .unwrap_or("unknown");
    let local = state
        .latest_from(AgentName::LocalContextAgent)
        .unwrap_or("unknown");

    match stage {
        Stage::AwaitGlobal => format!(
            "Determine how people are likely feeling in the location of this request: {}",
            request.query
        ),
        Stage::AwaitLocal if ctx.has_image() => format!(
            "Describe the user's local environment from the uploaded image: {}",
            ctx.image_ref
        ),
        Stage::AwaitLocal => {
            "No image was provided. Report that no local context is available.".to_string()
        }
        Stage::AwaitMemory => format!(
            "Search memory for preferences, environment patterns and past generations relevant to this session.\nGlobal context: {global}\nLocal context: {local}"
        ),
        Stage::AwaitReinforcement if request.has_feedback() => format!(
            "The user gave feedback on the previous soundscape: \"{}\". Record it with learn_from_interaction, then get recommendation weights.\nGlobal context: {global}\nLocal context: {local}",
            request.feedback
        ),
        Stage::AwaitReinforcement => format!(
            "Get recommendation weights for this session.\nGlobal context: {global}\nLocal context: {local}"
        ),
        Stage::DispatchGeneration => {
            let memory = state.latest_from(AgentName::MemoryAgent).unwrap_or("none");
            let recommendations = state
                .latest_from(AgentName::ReinforcementAgent)
                .unwrap_or("none");
            format!(
                "Generate an ambient soundscape for this session.\nGlobal context: {global}\nLocal context: {local}\nMemory: {memory}\nRecommendations: {recommendations}"
            )
        }
        Stage::AwaitMemoryWriteback | Stage::Done => String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels_name_the_answering_agent() {
        assert_eq!(stage_label(Stage::AwaitLocal), "local_context_agent");
        assert_eq!(stage_label(Stage::DispatchGeneration), "music_generation_agent");
        assert_eq!(stage_label(Stage::AwaitMemoryWriteback), "memory_writeback");
        assert_eq!(stage_label(Stage::Done), "done");
    }

    #[test]
    fn test_generation_cannot_skip_upstream() {
        let state = ConversationState::new("q");
        let err = ensure_upstream(&state).unwrap_err();
        assert!(err.to_string().contains("global_context_agent has not answered"));
    }

    #[test]
    fn test_request_defaults() {
        let request: SessionRequest = serde_json::from_str(r#"{"query":"Oslo at night"}"#).unwrap();
        assert_eq!(request.image_ref, NO_IMAGE);
        assert!(!request.has_feedback());
        assert_eq!(SessionRequest::new("q").with_image("  ").image_ref, NO_IMAGE);
    }
}
