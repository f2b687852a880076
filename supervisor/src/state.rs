//! Session state owned by the supervisor.

use amb_core::{AgentName, Message, Role, ToolInvocation};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Protocol position of a session. Transitions only move forward, one step
/// at a time, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    AwaitGlobal,
    AwaitLocal,
    AwaitMemory,
    AwaitReinforcement,
    DispatchGeneration,
    AwaitMemoryWriteback,
    Done
}

impl Stage {
    /// The specialist that answers in this stage.
    pub fn agent(self) -> Option<AgentName> {
        match self {
            Stage::AwaitGlobal => Some(AgentName::GlobalContextAgent),
            Stage::AwaitLocal => Some(AgentName::LocalContextAgent),
            Stage::AwaitMemory | Stage::AwaitMemoryWriteback => Some(AgentName::MemoryAgent),
            Stage::AwaitReinforcement => Some(AgentName::ReinforcementAgent),
            Stage::DispatchGeneration => Some(AgentName::MusicGenerationAgent),
            Stage::Done => None
        }
    }

    /// Next stage. Reinforcement is skipped unless it is wanted.
    pub fn next(self, with_reinforcement: bool) -> Stage {
        match self {
            Stage::AwaitGlobal => Stage::AwaitLocal,
            Stage::AwaitLocal => Stage::AwaitMemory,
            Stage::AwaitMemory if with_reinforcement => Stage::AwaitReinforcement,
            Stage::AwaitMemory | Stage::AwaitReinforcement => Stage::DispatchGeneration,
            Stage::DispatchGeneration => Stage::AwaitMemoryWriteback,
            Stage::AwaitMemoryWriteback | Stage::Done => Stage::Done
        }
    }

    /// Stages that must have answered before generation may be dispatched.
    pub const REQUIRED_UPSTREAM: [Stage; 3] =
        [Stage::AwaitGlobal, Stage::AwaitLocal, Stage::AwaitMemory];
}

/// One transfer of control to a specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub stage: Stage,
    pub target: AgentName,
    pub capability: String,
    /// The conversation as the target saw it, instruction last.
    pub payload: Vec<Message>
}

/// A tool call attributed to the agent that made it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedInvocation {
    pub agent: AgentName,
    #[serde(flatten)]
    pub invocation: ToolInvocation
}

/// Append-only conversation of one session.
///
/// Nothing is ever removed or rewritten; every handoff payload is a
/// snapshot of the full history so far.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    handoffs: Vec<HandoffRecord>,
    tool_calls: Vec<AttributedInvocation>,
    completed: Vec<Stage>
}

impl ConversationState {
    pub fn new(query: &str) -> Self {
        Self {
            messages: vec![Message::user(query)],
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn handoffs(&self) -> &[HandoffRecord] {
        &self.handoffs
    }

    pub fn tool_calls(&self) -> &[AttributedInvocation] {
        &self.tool_calls
    }

    pub fn completed(&self) -> &[Stage] {
        &self.completed
    }

    pub fn has_completed(&self, stage: Stage) -> bool {
        self.completed.contains(&stage)
    }

    /// Appends the supervisor's instruction and records the handoff.
    pub fn hand_off(&mut self, stage: Stage, target: AgentName, instruction: String) -> &HandoffRecord {
        self.messages.push(Message {
            role: Role::User,
            name: Some(AgentName::Supervisor.to_string()),
            content: instruction,
            tool_calls: Vec::new(),
            tool_call_id: None
        });
        self.handoffs.push(HandoffRecord {
            stage,
            target,
            capability: target.capability().to_string(),
            payload: self.messages.clone()
        });
        &self.handoffs[self.handoffs.len() - 1]
    }

    /// Appends a specialist's signed answer and its tool trace.
    pub fn complete(
        &mut self,
        stage: Stage,
        agent: AgentName,
        response: Message,
        trace: Vec<ToolInvocation>
    ) {
        self.tool_calls.extend(
            trace
                .into_iter()
                .map(|invocation| AttributedInvocation { agent, invocation })
        );
        self.messages.push(response);
        self.completed.push(stage);
    }

    /// Latest message content signed by `agent`.
    pub fn latest_from(&self, agent: AgentName) -> Option<&str> {
        let name = agent.to_string();
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.author() == Some(name.as_str()))
            .map(|m| m.content.as_str())
    }
}
