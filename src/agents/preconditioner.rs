//! Preconditioner agent (`spec.md` §4.7.1).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::AgentError;
use crate::llm::{ChatModel, ModelMessage, ModelUsage};
use crate::llm::contract::AgentContract;
use crate::model::ToolDescriptor;

pub struct PreconditionerInput<'a> {
    pub instruction: &'a str,
    pub mutating_tools: &'a [&'a ToolDescriptor],
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreconditionerOutput {
    pub tool: String,
    #[serde(default)]
    pub params: Value,
    #[serde(rename = "suggestedName")]
    pub suggested_name: String,
    pub description: String,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "tool": { "type": "string" },
            "params": { "type": "object" },
            "suggestedName": { "type": "string" },
            "description": { "type": "string" }
        },
        "required": ["tool", "params", "suggestedName", "description"]
    })
}

fn system_prompt(input: &PreconditionerInput) -> String {
    let tool_list: Vec<String> = input
        .mutating_tools
        .iter()
        .map(|tool| format!("- {} : {} (params: {})", tool.name, tool.description, tool.parameters))
        .collect();

    format!(
        "You set up test preconditions before an end-to-end scenario runs. \
         Given a natural-language instruction, select exactly one mutating tool from the list below, \
         choose its parameters, and propose a SharedMemory storage name for the result. \
         Prefer referencing already-populated SharedMemory fields over inventing new values where sensible.\n\n\
         Available mutating tools:\n{}",
        tool_list.join("\n")
    )
}

/// Runs the Preconditioner for one instruction-style precondition, returning
/// the combined token usage for cost accounting.
pub async fn run(
    model: &dyn ChatModel,
    input: PreconditionerInput<'_>,
) -> Result<(PreconditionerOutput, ModelUsage), AgentError> {
    let contract = AgentContract::new(
        "select_precondition_tool",
        "Selects a mutating tool and its parameters for one test precondition.",
        schema(),
    );

    let messages = vec![
        ModelMessage::System(system_prompt(&input)),
        ModelMessage::User(input.instruction.to_string()),
    ];

    contract.invoke(model, messages).await
}
