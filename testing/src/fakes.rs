use amb_core::{
    AudioBackend, BoxError, CaptionRequest, CompletionRequest, ImageCaptioner, LanguageModel,
    Message, Metadata, ScoredRecord, SearchHit, ToolCall, TrackRequest, WebSearch
};
use async_trait::async_trait;
use memory::{MemoryError, MemoryResult, MemoryStore};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Turn {
    Reply(String),
    ToolCalls(Vec<ToolCall>),
    Raw(Message),
    Failure(String),
    Stall
}

/// A language model that plays back queued turns per agent.
///
/// Turns are keyed by the `agent` field of the request, so one model can be
/// shared by every specialist of a run. An agent with an empty queue gets an
/// error, which surfaces as an upstream model failure.
#[derive(Default)]
pub struct ScriptedModel {
    turns: Mutex<HashMap<String, VecDeque<Turn>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Mutex<Option<Duration>>
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, agent: &str, turn: Turn) {
        self.turns
            .lock()
            .entry(agent.to_string())
            .or_default()
            .push_back(turn);
    }

    pub fn push_reply(&self, agent: &str, content: impl Into<String>) {
        self.push(agent, Turn::Reply(content.into()));
    }

    pub fn push_tool_calls(&self, agent: &str, calls: Vec<ToolCall>) {
        self.push(agent, Turn::ToolCalls(calls));
    }

    /// Queues a message returned exactly as given, author included.
    pub fn push_message(&self, agent: &str, message: Message) {
        self.push(agent, Turn::Raw(message));
    }

    pub fn push_failure(&self, agent: &str, reason: impl Into<String>) {
        self.push(agent, Turn::Failure(reason.into()));
    }

    /// Queues a turn that never answers; only cancellation gets past it.
    pub fn push_stall(&self, agent: &str) {
        self.push(agent, Turn::Stall);
    }

    /// Every completion waits this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_for(&self, agent: &str) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.agent == agent)
            .cloned()
            .collect()
    }

    /// Agents in call order, with consecutive repeats collapsed.
    pub fn call_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for request in self.requests.lock().iter() {
            if order.last() != Some(&request.agent) {
                order.push(request.agent.clone());
            }
        }
        order
    }

    pub fn remaining(&self, agent: &str) -> usize {
        self.turns.lock().get(agent).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<Message, BoxError> {
        let agent = request.agent.clone();
        self.requests.lock().push(request);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let turn = self
            .turns
            .lock()
            .get_mut(&agent)
            .and_then(VecDeque::pop_front);
        match turn {
            Some(Turn::Reply(content)) => Ok(Message::assistant(agent, content)),
            Some(Turn::ToolCalls(calls)) => Ok(Message::assistant(agent, "").with_tool_calls(calls)),
            Some(Turn::Raw(message)) => Ok(message),
            Some(Turn::Failure(reason)) => Err(reason.into()),
            Some(Turn::Stall) => std::future::pending().await,
            None => Err(format!("no scripted turn left for {agent}").into())
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Audio backend that renders each prompt as its own bytes and mixes by
/// concatenation.
#[derive(Default)]
pub struct FakeAudioBackend {
    requests: Mutex<Vec<TrackRequest>>,
    generate_calls: AtomicUsize,
    mix_calls: AtomicUsize,
    fail_generation: AtomicBool,
    delay: Mutex<Option<Duration>>
}

impl FakeAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let backend = Self::default();
        backend.fail_generation.store(true, Ordering::SeqCst);
        backend
    }

    /// Each `generate` waits this long before returning.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<TrackRequest> {
        self.requests.lock().clone()
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn mix_calls(&self) -> usize {
        self.mix_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioBackend for FakeAudioBackend {
    async fn generate(&self, request: &TrackRequest) -> Result<Vec<u8>, BoxError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_generation.load(Ordering::SeqCst) {
            return Err("diffusion pipeline unavailable".into());
        }
        Ok(format!("track:{}", request.prompt).into_bytes())
    }

    async fn mix(&self, tracks: &[Vec<u8>]) -> Result<Vec<u8>, BoxError> {
        self.mix_calls.fetch_add(1, Ordering::SeqCst);
        Ok(tracks.join(&b'|'))
    }
}

pub struct FakeCaptioner {
    caption: String,
    requests: Mutex<Vec<CaptionRequest>>
}

impl FakeCaptioner {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            requests: Mutex::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<CaptionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ImageCaptioner for FakeCaptioner {
    async fn caption(&self, request: &CaptionRequest) -> Result<String, BoxError> {
        self.requests.lock().push(request.clone());
        Ok(self.caption.clone())
    }
}

/// Web search with a fixed answer.
pub struct StaticSearch {
    hits: Vec<SearchHit>,
    failure: Option<String>,
    queries: Mutex<Vec<String>>
}

impl StaticSearch {
    pub fn empty() -> Self {
        Self {
            hits: Vec::new(),
            failure: None,
            queries: Mutex::new(Vec::new())
        }
    }

    pub fn with_hit(title: &str, url: &str, content: &str) -> Self {
        let mut search = Self::empty();
        search.hits.push(SearchHit {
            title: title.to_string(),
            url: url.to_string(),
            content: content.to_string()
        });
        search
    }

    pub fn failing(reason: &str) -> Self {
        let mut search = Self::empty();
        search.failure = Some(reason.to_string());
        search
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl WebSearch for StaticSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, BoxError> {
        self.queries.lock().push(query.to_string());
        if let Some(reason) = &self.failure {
            return Err(reason.clone().into());
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}


/// A memory store that searches through `inner` but refuses every write.
pub struct ReadOnlyMemory {
    inner: Arc<dyn MemoryStore>,
    rejected_adds: AtomicUsize
}

impl ReadOnlyMemory {
    pub fn new(inner: Arc<dyn MemoryStore>) -> Self {
        Self {
            inner,
            rejected_adds: AtomicUsize::new(0)
        }
    }

    pub fn rejected_adds(&self) -> usize {
        self.rejected_adds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MemoryStore for ReadOnlyMemory {
    async fn add(&self, _text: &str, _metadata: Metadata) -> MemoryResult<String> {
        self.rejected_adds.fetch_add(1, Ordering::SeqCst);
        Err(MemoryError::StorageError("collection is read-only".to_string()))
    }

    async fn search_with_score(&self, query: &str, k: usize) -> MemoryResult<Vec<ScoredRecord>> {
        self.inner.search_with_score(query, k).await
    }

    async fn len(&self) -> usize {
        self.inner.len().await
    }

    async fn flush(&self) -> MemoryResult<()> {
        Ok(())
    }
}
