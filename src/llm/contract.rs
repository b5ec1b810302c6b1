use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AgentError;
use crate::llm::{ChatModel, ModelMessage, ModelToolChoice, ModelToolDefinition, ModelUsage};

fn add_usage(a: ModelUsage, b: ModelUsage) -> ModelUsage {
    ModelUsage {
        input_tokens: a.input_tokens + b.input_tokens,
        output_tokens: a.output_tokens + b.output_tokens,
    }
}

/// A typed request/response contract for one LLM agent call.
///
/// Every agent in `spec.md` §5 (Preconditioner, Planner, Probe Planner,
/// Semantic Validator, Goal Checker) is a pure function from a prompt to a
/// typed JSON result. The underlying `ChatModel` trait has no native JSON
/// mode, so the contract's response schema is declared as a single synthetic
/// tool and the call is forced onto it via `ModelToolChoice::Tool`, mirroring
/// how the teacher's agent loop drives structured tool calls.
pub struct AgentContract {
    pub tool_name: String,
    pub tool_description: String,
    pub schema: Value,
}

impl AgentContract {
    pub fn new(
        tool_name: impl Into<String>,
        tool_description: impl Into<String>,
        schema: Value,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_description: tool_description.into(),
            schema,
        }
    }

    fn tool_definition(&self) -> ModelToolDefinition {
        ModelToolDefinition {
            name: self.tool_name.clone(),
            description: self.tool_description.clone(),
            parameters: self.schema.clone(),
        }
    }

    /// Invokes `model` with `messages`, forcing a call to this contract's
    /// tool, and deserializes the arguments into `O`. Returns the combined
    /// token usage across every attempt, for cost accounting
    /// (`spec.md` §4.7).
    ///
    /// On a first failure — no matching tool call, or arguments that don't
    /// deserialize into `O` — allows exactly one reparse attempt with a
    /// narrowed, schema-reminding follow-up message, then escalates to
    /// `AgentError::Protocol` (`spec.md` §9).
    pub async fn invoke<O: DeserializeOwned>(
        &self,
        model: &dyn ChatModel,
        mut messages: Vec<ModelMessage>,
    ) -> Result<(O, ModelUsage), AgentError> {
        let tools = vec![self.tool_definition()];
        let tool_choice = ModelToolChoice::Tool(self.tool_name.clone());

        match self.try_once::<O>(model, &messages, &tools, tool_choice.clone()).await {
            Ok((value, usage)) => Ok((value, usage)),
            Err((first_error, first_usage)) => {
                messages.push(ModelMessage::User(format!(
                    "Your previous response did not match the required '{}' schema ({first_error}). \
                     Call '{}' again with arguments that satisfy this JSON schema exactly: {}",
                    self.tool_name, self.tool_name, self.schema
                )));

                self.try_once::<O>(model, &messages, &tools, tool_choice)
                    .await
                    .map(|(value, second_usage)| (value, add_usage(first_usage, second_usage)))
                    .map_err(|(second_error, second_usage)| {
                        AgentError::Protocol(format!(
                            "'{}' failed schema validation twice; first error: {first_error}; \
                             second error: {second_error} (spent {} tokens)",
                            self.tool_name,
                            add_usage(first_usage, second_usage).input_tokens
                        ))
                    })
            }
        }
    }

    async fn try_once<O: DeserializeOwned>(
        &self,
        model: &dyn ChatModel,
        messages: &[ModelMessage],
        tools: &[ModelToolDefinition],
        tool_choice: ModelToolChoice,
    ) -> Result<(O, ModelUsage), (String, ModelUsage)> {
        let completion = model
            .invoke(messages, tools, tool_choice)
            .await
            .map_err(|err| (err.to_string(), ModelUsage::default()))?;

        let usage = completion.usage.unwrap_or_default();

        let call = completion
            .tool_calls
            .into_iter()
            .find(|call| call.name == self.tool_name)
            .ok_or_else(|| (format!("model did not call '{}'", self.tool_name), usage))?;

        serde_json::from_value::<O>(call.arguments)
            .map(|value| (value, usage))
            .map_err(|err| (format!("arguments did not match schema: {err}"), usage))
    }
}
