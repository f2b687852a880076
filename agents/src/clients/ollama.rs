use super::{build_client, normalize_base};
use crate::error::{AgentError, AgentResult};
use amb_core::{BoxError, CompletionRequest, LanguageModel, Message, Role, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "ollama chat";

/// Chat completions with tool calling against an Ollama server
/// (`POST /api/chat`, non-streaming).
pub struct OllamaChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    stream: bool,
    options: ChatOptions
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunction
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireToolSpec<'a>
}

#[derive(Serialize)]
struct WireToolSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value
}

#[derive(Deserialize)]
struct ChatResponse {
    message: WireMessage
}

impl OllamaChatModel {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> AgentResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: normalize_base(base_url),
            model: model.into()
        })
    }

    fn to_wire(message: &Message) -> WireMessage {
        WireMessage {
            role: message.role.to_string(),
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.clone()
                    }
                })
                .collect(),
            tool_name: (message.role == Role::Tool)
                .then(|| message.name.clone())
                .flatten()
        }
    }

    async fn chat(&self, request: &CompletionRequest) -> AgentResult<Message> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(Self::to_wire(&Message::system(request.system.clone())));
        }
        messages.extend(request.messages.iter().map(Self::to_wire));

        let body = ChatRequest {
            model: &self.model,
            messages,
            tools: request
                .tools
                .iter()
                .map(|tool| WireTool {
                    kind: "function",
                    function: WireToolSpec {
                        name: &tool.name,
                        description: &tool.description,
                        parameters: &tool.input_schema
                    }
                })
                .collect(),
            stream: false,
            options: ChatOptions {
                temperature: request.temperature
            }
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(AgentError::http(SERVICE))?;
        if !response.status().is_success() {
            return Err(AgentError::from_response(SERVICE, response).await);
        }

        let reply: ChatResponse = response.json().await.map_err(AgentError::http(SERVICE))?;
        let calls: Vec<ToolCall> = reply
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolCall::new(call.function.name, call.function.arguments))
            .collect();
        debug!(agent = %request.agent, tool_calls = calls.len(), "chat completion received");

        Ok(Message::assistant(request.agent.clone(), reply.message.content).with_tool_calls(calls))
    }
}

#[async_trait]
impl LanguageModel for OllamaChatModel {
    async fn complete(&self, request: CompletionRequest) -> Result<Message, BoxError> {
        Ok(self.chat(&request).await?)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amb_core::ToolDefinition;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest {
            agent: "global_context_agent".to_string(),
            system: "be brief".to_string(),
            messages: vec![Message::user("Lisbon")],
            tools: vec![ToolDefinition {
                name: "get_current_time".to_string(),
                description: "Get current time and date".to_string(),
                input_schema: json!({ "type": "object", "properties": {} })
            }],
            temperature: 0.0
        }
    }

    #[tokio::test]
    async fn test_tool_calls_are_parsed_and_signed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "gpt-oss:20b",
                "stream": false,
                "messages": [{ "role": "system", "content": "be brief" }, { "role": "user", "content": "Lisbon" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{ "function": { "name": "get_current_time", "arguments": {} } }]
                },
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = OllamaChatModel::new(server.uri(), "gpt-oss:20b", Duration::from_secs(5)).unwrap();
        let reply = model.complete(request()).await.unwrap();

        assert_eq!(reply.author(), Some("global_context_agent"));
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "get_current_time");
        assert!(!reply.tool_calls[0].id.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let model = OllamaChatModel::new(server.uri(), "missing", Duration::from_secs(5)).unwrap();
        let err = model.complete(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "ollama chat returned status 404: model not found");
    }
}
