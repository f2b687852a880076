//! Specialist agents.
//!
//! A specialist is a composition of a name, an instruction policy and a tool
//! registry, driven by a language model in a bounded tool-calling loop. The
//! control layer here, not the prompt, enforces the step budget, per-call
//! timeouts, cancellation and the tool budgets held in [`ToolContext`].

use crate::context::ToolContext;
use crate::tool::ToolRegistry;
use amb_core::{
    AgentName, CompletionRequest, LanguageModel, Message, ToolCall, ToolInvocation, ToolStatus
};
use async_trait::async_trait;
use errors::{SessionError, ToolError};
use metrics::{counter, histogram};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// What one invocation produced: the signed response plus every tool call
/// it made, in order.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub response: Message,
    pub trace: Vec<ToolInvocation>
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> AgentName;

    fn capability(&self) -> &str {
        self.name().capability()
    }

    /// Runs the agent on a slice of the conversation.
    async fn invoke(&self, ctx: &ToolContext, slice: &[Message]) -> Result<AgentOutput, SessionError>;

    /// Calls one of the agent's tools directly, bypassing the model.
    async fn invoke_tool(
        &self,
        ctx: &ToolContext,
        tool: &str,
        arguments: Value
    ) -> Result<ToolInvocation, ToolError>;
}

/// How a specialist closes out a run once the model stops calling tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishPolicy {
    #[default]
    Reply,
    /// The run must end with exactly one merge. When the model stopped with
    /// tracks but no merge, the specialist issues the merge itself; a run
    /// with no tracks at all is a failure.
    RequireMerge
}

pub struct Specialist {
    name: AgentName,
    policy: String,
    tools: ToolRegistry,
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    max_steps: usize,
    tool_timeout: Duration,
    finish: FinishPolicy
}

impl Specialist {
    pub fn new(
        name: AgentName,
        policy: impl Into<String>,
        tools: ToolRegistry,
        model: Arc<dyn LanguageModel>
    ) -> Self {
        Self {
            name,
            policy: policy.into(),
            tools,
            model,
            temperature: 0.0,
            max_steps: 12,
            tool_timeout: Duration::from_secs(120),
            finish: FinishPolicy::Reply
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_finish(mut self, finish: FinishPolicy) -> Self {
        self.finish = finish;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }

    fn stage(&self) -> String {
        self.name.to_string()
    }

    fn upstream(&self, reason: impl Into<String>) -> SessionError {
        SessionError::UpstreamModel {
            stage: self.stage(),
            reason: reason.into()
        }
    }

    fn cancelled(&self) -> SessionError {
        SessionError::Cancelled { stage: self.stage() }
    }

    async fn complete(&self, ctx: &ToolContext, messages: &[Message]) -> Result<Message, SessionError> {
        let request = CompletionRequest {
            agent: self.stage(),
            system: self.policy.clone(),
            messages: messages.to_vec(),
            tools: self.tools.list_tools(),
            temperature: self.temperature
        };

        let start = Instant::now();
        let result = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(self.cancelled()),
            result = tokio::time::timeout(self.tool_timeout, self.model.complete(request)) => result
        };
        histogram!("agent_model_latency_seconds", "agent" => self.stage())
            .record(start.elapsed().as_secs_f64());

        match result {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(e)) => Err(self.upstream(e.to_string())),
            Err(_) => Err(SessionError::Timeout {
                stage: self.stage(),
                operation: format!("{} model call", self.model.model_name()),
                timeout_ms: self.tool_timeout.as_millis() as u64
            })
        }
    }

    /// Runs one tool call under the timeout and cancellation token.
    async fn run_tool(&self, ctx: &ToolContext, call: &ToolCall) -> (ToolInvocation, Option<ToolError>) {
        let start = Instant::now();
        let outcome = if ctx.is_cancelled() {
            Err(ToolError::Cancelled)
        } else {
            tokio::select! {
                _ = ctx.cancel.cancelled() => Err(ToolError::Cancelled),
                result = tokio::time::timeout(
                    self.tool_timeout,
                    self.tools.call(ctx, &call.name, call.arguments.clone())
                ) => result.unwrap_or_else(|_| Err(ToolError::Timeout {
                    tool: call.name.clone(),
                    timeout_ms: self.tool_timeout.as_millis() as u64
                }))
            }
        };

        let (status, output, error) = match outcome {
            Ok(output) => (ToolStatus::Ok, output, None),
            Err(err @ ToolError::BudgetExceeded { .. }) => {
                (ToolStatus::Rejected, format!("Error: {err}"), Some(err))
            }
            Err(err) => (ToolStatus::Failed, format!("Error: {err}"), Some(err))
        };

        counter!(
            "agent_tool_calls_total",
            "agent" => self.stage(),
            "tool" => call.name.clone(),
            "status" => status.to_string()
        )
        .increment(1);
        histogram!("agent_tool_latency_seconds", "tool" => call.name.clone())
            .record(start.elapsed().as_secs_f64());
        debug!(
            session_id = %ctx.session_id,
            agent = %self.name,
            tool = %call.name,
            status = %status,
            "tool call finished"
        );

        (
            ToolInvocation {
                call_id: call.id.clone(),
                tool: call.name.clone(),
                arguments: call.arguments.clone(),
                output,
                status
            },
            error
        )
    }

    /// Issues the merge on the model's behalf when it stopped short.
    async fn close_generation(
        &self,
        ctx: &ToolContext,
        trace: &mut Vec<ToolInvocation>
    ) -> Result<Option<String>, SessionError> {
        if ctx.workspace.merged().is_some() {
            return Ok(None);
        }
        let tracks = ctx.workspace.tracks();
        if tracks.is_empty() {
            return Err(self.upstream("finished without generating any tracks"));
        }

        warn!(
            session_id = %ctx.session_id,
            tracks = tracks.len(),
            "model stopped before merging; merging generated tracks"
        );
        let call = ToolCall::new(
            crate::budget::OVERLAY_AUDIO,
            serde_json::json!({ "file_names": tracks })
        );
        let (invocation, error) = self.run_tool(ctx, &call).await;
        let output = invocation.output.clone();
        trace.push(invocation);
        match error {
            Some(err) => Err(err.into_session_error(&self.stage())),
            None => Ok(Some(output))
        }
    }
}

#[async_trait]
impl Agent for Specialist {
    fn name(&self) -> AgentName {
        self.name
    }

    #[instrument(skip(self, ctx, slice), fields(session_id = %ctx.session_id, agent = %self.name))]
    async fn invoke(&self, ctx: &ToolContext, slice: &[Message]) -> Result<AgentOutput, SessionError> {
        let mut messages = slice.to_vec();
        let mut trace = Vec::new();

        for step in 0..self.max_steps {
            if ctx.is_cancelled() {
                return Err(self.cancelled());
            }

            let mut response = self.complete(ctx, &messages).await?;

            if response.tool_calls.is_empty() {
                if response.content.trim().is_empty() {
                    return Err(self.upstream("model returned an empty response"));
                }

                if self.finish == FinishPolicy::RequireMerge
                    && let Some(merged) = self.close_generation(ctx, &mut trace).await?
                {
                    response.content = format!("{}\nMerged soundscape: {merged}", response.content);
                }

                if response.name.is_none() {
                    response.name = Some(self.stage());
                }
                info!(steps = step + 1, tool_calls = trace.len(), "agent finished");
                return Ok(AgentOutput { response, trace });
            }

            let calls = response.tool_calls.clone();
            if response.name.is_none() {
                response.name = Some(self.stage());
            }
            messages.push(response);

            for call in &calls {
                let (invocation, error) = self.run_tool(ctx, call).await;
                messages.push(Message::tool_result(
                    &invocation.call_id,
                    &invocation.tool,
                    &invocation.output
                ));
                trace.push(invocation);

                if let Some(err) = error
                    && err.is_fatal()
                {
                    warn!(tool = %call.name, error = %err, "fatal tool error");
                    return Err(err.into_session_error(&self.stage()));
                }
            }
        }

        Err(self.upstream(format!(
            "did not finish within {} steps",
            self.max_steps
        )))
    }

    async fn invoke_tool(
        &self,
        ctx: &ToolContext,
        tool: &str,
        arguments: Value
    ) -> Result<ToolInvocation, ToolError> {
        let call = ToolCall::new(tool, arguments);
        let (invocation, error) = self.run_tool(ctx, &call).await;
        match error {
            Some(err) => Err(err),
            None => Ok(invocation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::generation_tools;
    use serde_json::json;
    use testing::{FakeAudioBackend, ScriptedModel};

    fn ctx(root: &std::path::Path) -> ToolContext {
        ToolContext::new(
            "session-1",
            crate::context::NO_IMAGE,
            Default::default(),
            Default::default(),
            root,
            "combined_audio.wav"
        )
    }

    fn generation_agent(model: Arc<ScriptedModel>, backend: Arc<FakeAudioBackend>) -> Specialist {
        let mut tools = ToolRegistry::new();
        for tool in generation_tools(backend, 15, 11) {
            tools.register(tool);
        }
        Specialist::new(AgentName::MusicGenerationAgent, "generate", tools, model)
            .with_finish(FinishPolicy::RequireMerge)
    }

    fn track_call(i: usize) -> ToolCall {
        ToolCall::new(
            "generate_music",
            json!({ "prompt": format!("layer {i}"), "file_name": format!("t{i}") })
        )
    }

    #[tokio::test]
    async fn test_response_is_signed_and_traced() {
        let root = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new());
        let backend = Arc::new(FakeAudioBackend::new());
        model.push_tool_calls("music_generation_agent", vec![track_call(0)]);
        model.push_tool_calls(
            "music_generation_agent",
            vec![ToolCall::new("overlay_audio_files", json!({ "file_names": ["t0.wav"] }))]
        );
        model.push_reply("music_generation_agent", "A single warm pad.");

        let agent = generation_agent(model.clone(), backend.clone());
        let output = agent
            .invoke(&ctx(root.path()), &[Message::user("calm evening")])
            .await
            .unwrap();

        assert_eq!(output.response.author(), Some("music_generation_agent"));
        assert_eq!(output.trace.len(), 2);
        assert!(output.trace.iter().all(|t| t.status == ToolStatus::Ok));
        assert_eq!(backend.mix_calls(), 1);
        assert_eq!(model.requests_for("music_generation_agent").len(), 3);
    }

    #[tokio::test]
    async fn test_fifth_track_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new());
        let backend = Arc::new(FakeAudioBackend::new());
        model.push_tool_calls(
            "music_generation_agent",
            (0..5).map(track_call).collect()
        );

        let agent = generation_agent(model, backend.clone());
        let err = agent
            .invoke(&ctx(root.path()), &[Message::user("busy street")])
            .await
            .unwrap_err();

        assert_eq!(err.code(), "TOOL_BUDGET_EXCEEDED");
        assert_eq!(err.stage(), "music_generation_agent");
        assert_eq!(backend.generate_calls(), 4);
    }

    #[tokio::test]
    async fn test_missing_merge_is_issued_by_the_agent() {
        let root = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new());
        let backend = Arc::new(FakeAudioBackend::new());
        model.push_tool_calls("music_generation_agent", vec![track_call(0), track_call(1)]);
        model.push_reply("music_generation_agent", "Two layers of rain.");

        let agent = generation_agent(model, backend.clone());
        let ctx = ctx(root.path());
        let output = agent.invoke(&ctx, &[Message::user("rain")]).await.unwrap();

        assert_eq!(backend.mix_calls(), 1);
        assert!(ctx.workspace.merged().is_some());
        assert!(output.response.content.contains("Merged soundscape"));
        assert_eq!(output.trace.last().unwrap().tool, "overlay_audio_files");
    }

    #[tokio::test]
    async fn test_no_tracks_is_an_upstream_failure() {
        let root = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new());
        model.push_reply("music_generation_agent", "I could not think of anything.");

        let agent = generation_agent(model, Arc::new(FakeAudioBackend::new()));
        let err = agent
            .invoke(&ctx(root.path()), &[Message::user("silence")])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_MODEL_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_back_to_the_model() {
        let root = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new());
        model.push_tool_calls(
            "global_context_agent",
            vec![ToolCall::new("check_horoscope", json!({}))]
        );
        model.push_reply("global_context_agent", "People in Oslo are likely feeling calm.");

        let agent = Specialist::new(
            AgentName::GlobalContextAgent,
            "context",
            ToolRegistry::new(),
            model.clone()
        );
        let output = agent
            .invoke(&ctx(root.path()), &[Message::user("Oslo")])
            .await
            .unwrap();
        assert_eq!(output.trace[0].status, ToolStatus::Failed);

        let second = &model.requests_for("global_context_agent")[1];
        let last = second.messages.last().unwrap();
        assert!(last.content.starts_with("Error: Unknown tool"));
    }

    #[tokio::test]
    async fn test_model_failure_names_the_stage() {
        let root = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new());
        model.push_failure("local_context_agent", "connection refused");

        let agent = Specialist::new(
            AgentName::LocalContextAgent,
            "local",
            ToolRegistry::new(),
            model
        );
        let err = agent
            .invoke(&ctx(root.path()), &[Message::user("room")])
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "local_context_agent");
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_step_budget() {
        let root = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new());
        for _ in 0..3 {
            model.push_tool_calls(
                "memory_agent",
                vec![ToolCall::new("nothing", json!({}))]
            );
        }
        let agent = Specialist::new(
            AgentName::MemoryAgent,
            "memory",
            ToolRegistry::new(),
            model
        )
        .with_max_steps(2);
        let err = agent
            .invoke(&ctx(root.path()), &[Message::user("x")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not finish within 2 steps"));
    }

    #[tokio::test]
    async fn test_cancel_stops_before_the_model_is_called() {
        let root = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new());
        model.push_reply("memory_agent", "unused");
        let agent = Specialist::new(
            AgentName::MemoryAgent,
            "memory",
            ToolRegistry::new(),
            model.clone()
        );
        let ctx = ctx(root.path());
        ctx.cancel.cancel();

        let err = agent.invoke(&ctx, &[Message::user("x")]).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(model.requests_for("memory_agent").is_empty());
    }

    #[tokio::test]
    async fn test_stalled_model_times_out_in_its_stage() {
        let root = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new());
        model.push_stall("global_context_agent");

        let agent = Specialist::new(
            AgentName::GlobalContextAgent,
            "context",
            ToolRegistry::new(),
            model
        )
        .with_tool_timeout(Duration::from_millis(50));
        let err = agent
            .invoke(&ctx(root.path()), &[Message::user("Oslo")])
            .await
            .unwrap_err();

        assert_eq!(err.code(), "TIMEOUT");
        assert_eq!(err.stage(), "global_context_agent");
        assert!(err.to_string().contains("model call"), "{err}");
    }

    #[tokio::test]
    async fn test_stalled_tool_call_times_out_and_ends_the_run() {
        let root = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new());
        let backend = Arc::new(FakeAudioBackend::new().with_delay(Duration::from_secs(30)));
        model.push_tool_calls("music_generation_agent", vec![track_call(0)]);
        model.push_reply("music_generation_agent", "never reached");

        let agent = generation_agent(model.clone(), backend.clone())
            .with_tool_timeout(Duration::from_millis(50));
        let ctx = ctx(root.path());
        let started = Instant::now();
        let err = agent
            .invoke(&ctx, &[Message::user("slow rain")])
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(err.code(), "TIMEOUT");
        assert_eq!(err.stage(), "music_generation_agent");
        assert!(err.to_string().contains("generate_music"), "{err}");
        assert!(ctx.workspace.tracks().is_empty());
        assert_eq!(model.remaining("music_generation_agent"), 1);
    }
}
