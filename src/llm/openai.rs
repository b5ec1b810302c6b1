use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ProviderError;
use crate::llm::{
    ChatModel, ModelCompletion, ModelMessage, ModelToolCall, ModelToolChoice, ModelToolDefinition,
    ModelUsage,
};

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const EMPTY_USER_CONTENT_FALLBACK: &str = " ";

/// Runtime configuration for [`OpenAiModel`].
#[derive(Debug, Clone)]
pub struct OpenAiModelConfig {
    pub api_key: String,
    pub model: String,
    pub api_base_url: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl OpenAiModelConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_base_url: None,
            // spec.md §4.7: "a fixed temperature of 0-0.2" for every agent call.
            temperature: Some(0.1),
            top_p: None,
            max_tokens: Some(1024),
        }
    }
}

/// OpenAI-compatible chat-completions adapter implementing [`ChatModel`].
///
/// The concrete backend is out of scope for the core (`spec.md` §1); this
/// adapter exists so the environment variables named in `spec.md` §6
/// (`OPENAI_API_KEY`, `OPENAI_MODEL`) resolve to a runnable model.
#[derive(Debug, Clone)]
pub struct OpenAiModel {
    client: Client,
    config: OpenAiModelConfig,
}

impl OpenAiModel {
    pub fn new(config: OpenAiModelConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        Ok(Self { client, config })
    }

    /// Creates a model adapter using `OPENAI_API_KEY` / `OPENAI_MODEL` from
    /// the environment, defaulting the model to `gpt-4o-mini`
    /// (`spec.md` §6).
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::Request("OPENAI_API_KEY is not set".to_string()))?;
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Self::new(OpenAiModelConfig::new(api_key, model))
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/chat/completions")
    }
}

#[async_trait]
impl ChatModel for OpenAiModel {
    async fn invoke(
        &self,
        messages: &[ModelMessage],
        tools: &[ModelToolDefinition],
        tool_choice: ModelToolChoice,
    ) -> Result<ModelCompletion, ProviderError> {
        let request = build_request(messages, tools, tool_choice, &self.config);

        let response = self
            .client
            .post(self.endpoint())
            .header("authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Request(extract_api_error(response).await));
        }

        let payload = response
            .json::<OpenAiChatCompletionResponse>()
            .await
            .map_err(|err| ProviderError::Response(err.to_string()))?;

        normalize_response(payload)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatCompletionRequest {
    model: String,
    messages: Vec<OpenAiRequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<OpenAiToolChoicePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum OpenAiRequestMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<OpenAiToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct OpenAiToolDefinition {
    #[serde(rename = "type")]
    type_: String,
    function: OpenAiToolFunctionDefinition,
}

#[derive(Debug, Serialize)]
struct OpenAiToolFunctionDefinition {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAiToolChoicePayload {
    Mode(String),
    Specific {
        #[serde(rename = "type")]
        type_: String,
        function: OpenAiToolChoiceFunction,
    },
}

#[derive(Debug, Serialize)]
struct OpenAiToolChoiceFunction {
    name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    type_: String,
    function: OpenAiToolCallFunction,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAiToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatCompletionResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiAssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiAssistantMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiApiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiError {
    message: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
}

fn build_request(
    messages: &[ModelMessage],
    tools: &[ModelToolDefinition],
    tool_choice: ModelToolChoice,
    config: &OpenAiModelConfig,
) -> OpenAiChatCompletionRequest {
    let request_messages = ensure_non_empty_messages(to_openai_messages(messages));

    let tools_payload = if tools.is_empty() {
        None
    } else {
        Some(
            tools
                .iter()
                .map(|tool| OpenAiToolDefinition {
                    type_: "function".to_string(),
                    function: OpenAiToolFunctionDefinition {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect::<Vec<_>>(),
        )
    };

    let tool_choice_payload = if tools.is_empty() {
        None
    } else {
        Some(match tool_choice {
            ModelToolChoice::Auto => OpenAiToolChoicePayload::Mode("auto".to_string()),
            ModelToolChoice::Required => OpenAiToolChoicePayload::Mode("required".to_string()),
            ModelToolChoice::None => OpenAiToolChoicePayload::Mode("none".to_string()),
            ModelToolChoice::Tool(name) => OpenAiToolChoicePayload::Specific {
                type_: "function".to_string(),
                function: OpenAiToolChoiceFunction { name },
            },
        })
    };

    OpenAiChatCompletionRequest {
        model: config.model.clone(),
        messages: request_messages,
        tools: tools_payload,
        tool_choice: tool_choice_payload,
        temperature: config.temperature,
        top_p: config.top_p,
        max_tokens: config.max_tokens,
    }
}

fn to_openai_messages(messages: &[ModelMessage]) -> Vec<OpenAiRequestMessage> {
    let mut request_messages = Vec::new();

    for message in messages {
        match message {
            ModelMessage::System(content) => {
                if content.is_empty() {
                    continue;
                }
                request_messages.push(OpenAiRequestMessage::System {
                    content: content.clone(),
                });
            }
            ModelMessage::User(content) => {
                if content.is_empty() {
                    continue;
                }
                request_messages.push(OpenAiRequestMessage::User {
                    content: content.clone(),
                });
            }
            ModelMessage::Assistant {
                content,
                tool_calls,
            } => {
                let serialized_tool_calls = tool_calls
                    .iter()
                    .map(|tool_call| OpenAiToolCall {
                        id: tool_call.id.clone(),
                        type_: "function".to_string(),
                        function: OpenAiToolCallFunction {
                            name: tool_call.name.clone(),
                            arguments: tool_call.arguments.to_string(),
                        },
                    })
                    .collect::<Vec<_>>();

                let assistant_content = content.as_ref().filter(|text| !text.is_empty()).cloned();
                if assistant_content.is_none() && serialized_tool_calls.is_empty() {
                    continue;
                }

                request_messages.push(OpenAiRequestMessage::Assistant {
                    content: assistant_content,
                    tool_calls: if serialized_tool_calls.is_empty() {
                        None
                    } else {
                        Some(serialized_tool_calls)
                    },
                });
            }
            ModelMessage::ToolResult {
                tool_call_id,
                tool_name: _,
                content,
                is_error,
            } => {
                let rendered = if *is_error {
                    format!("Error: {content}")
                } else {
                    content.clone()
                };

                request_messages.push(OpenAiRequestMessage::Tool {
                    tool_call_id: tool_call_id.clone(),
                    content: rendered,
                });
            }
        }
    }

    request_messages
}

fn ensure_non_empty_messages(mut messages: Vec<OpenAiRequestMessage>) -> Vec<OpenAiRequestMessage> {
    if messages.is_empty() {
        messages.push(OpenAiRequestMessage::User {
            content: EMPTY_USER_CONTENT_FALLBACK.to_string(),
        });
    }

    messages
}

fn normalize_response(
    response: OpenAiChatCompletionResponse,
) -> Result<ModelCompletion, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Response("openai response missing choices".to_string()))?;

    let message = choice.message.ok_or_else(|| {
        ProviderError::Response("openai response missing choice message".to_string())
    })?;

    let mut tool_calls = Vec::new();
    for tool_call in message.tool_calls {
        let arguments = if tool_call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str::<Value>(&tool_call.function.arguments).map_err(|err| {
                ProviderError::Response(format!(
                    "openai tool call arguments for '{}' are not valid JSON: {err}",
                    tool_call.function.name
                ))
            })?
        };

        tool_calls.push(ModelToolCall {
            id: tool_call.id,
            name: tool_call.function.name,
            arguments,
        });
    }

    let usage = response.usage.map(|usage| ModelUsage {
        input_tokens: usage.prompt_tokens.unwrap_or(0),
        output_tokens: usage.completion_tokens.unwrap_or(0),
    });

    Ok(ModelCompletion {
        text: message.content,
        thinking: None,
        tool_calls,
        usage,
    })
}

async fn extract_api_error(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<OpenAiErrorEnvelope>(&body) {
        Ok(envelope) => format!(
            "{status}: {} ({})",
            envelope.error.message.unwrap_or_default(),
            envelope.error.type_.unwrap_or_default()
        ),
        Err(_) => format!("{status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn normalize_response_extracts_tool_calls_and_text() {
        let response = OpenAiChatCompletionResponse {
            choices: vec![OpenAiChoice {
                message: Some(OpenAiAssistantMessage {
                    content: Some("looking up".to_string()),
                    tool_calls: vec![OpenAiToolCall {
                        id: "call_1".to_string(),
                        type_: "function".to_string(),
                        function: OpenAiToolCallFunction {
                            name: "search".to_string(),
                            arguments: json!({"query": "rust"}).to_string(),
                        },
                    }],
                }),
            }],
            usage: Some(OpenAiUsage {
                prompt_tokens: Some(10),
                completion_tokens: Some(5),
            }),
        };

        let completion = normalize_response(response).unwrap();
        assert_eq!(completion.text.as_deref(), Some("looking up"));
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "search");
        assert_eq!(
            completion.usage,
            Some(ModelUsage {
                input_tokens: 10,
                output_tokens: 5,
            })
        );
    }

    #[test]
    fn to_openai_messages_renders_tool_result_errors() {
        let history = vec![
            ModelMessage::System("sys".to_string()),
            ModelMessage::User("u1".to_string()),
            ModelMessage::ToolResult {
                tool_call_id: "call_1".to_string(),
                tool_name: "search".to_string(),
                content: "failed".to_string(),
                is_error: true,
            },
        ];

        let rendered = to_openai_messages(&history);
        assert_eq!(rendered.len(), 3);
        match &rendered[2] {
            OpenAiRequestMessage::Tool { content, .. } => assert_eq!(content, "Error: failed"),
            other => panic!("expected tool message, got {other:?}"),
        }
    }

    #[test]
    fn build_request_omits_tools_when_empty() {
        let config = OpenAiModelConfig::new("key", "gpt-4o-mini");
        let request = build_request(&[ModelMessage::User("hi".to_string())], &[], ModelToolChoice::Auto, &config);
        assert!(request.tools.is_none());
        assert!(request.tool_choice.is_none());
    }
}

impl std::fmt::Debug for OpenAiRequestMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenAiRequestMessage::System { .. } => write!(f, "System"),
            OpenAiRequestMessage::User { .. } => write!(f, "User"),
            OpenAiRequestMessage::Assistant { .. } => write!(f, "Assistant"),
            OpenAiRequestMessage::Tool { .. } => write!(f, "Tool"),
        }
    }
}
