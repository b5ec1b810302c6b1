//! Probe Planner agent (`spec.md` §4.7.3).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::context::PlannerContext;
use crate::error::AgentError;
use crate::llm::contract::AgentContract;
use crate::llm::ChatModel;
use crate::llm::ModelMessage;
use crate::llm::ModelUsage;
use crate::model::{Action, Sdelta, Sdom, ToolDescriptor};

pub struct ProbePlannerInput<'a> {
    pub action_taken: &'a Action,
    pub sdom: &'a Sdom,
    pub sdelta: Option<&'a Sdelta>,
    pub goal_description: &'a str,
    pub read_only_tools: &'a [&'a ToolDescriptor],
    pub context: &'a PlannerContext,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeSpec {
    pub tool: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProbePlannerOutput {
    #[serde(default)]
    pub probes: Vec<ProbeSpec>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "probes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "tool": { "type": "string" },
                        "params": { "type": "object" },
                        "description": { "type": "string" }
                    },
                    "required": ["tool", "params"]
                }
            }
        },
        "required": ["probes"]
    })
}

const SYSTEM_PROMPT: &str = "You decide which read-only backend probes, if any, should be run to \
verify the last UI action's effect against backend state. Never probe on pure form-input pages \
(pages presenting only empty inputs and search-like headings). Never propose a probe that needs an id \
not present in context. Keep the probe set minimal. Include a probe when the page displays \
user-specific or entity-specific data that backend state can confirm or refute. Parameter values may \
reference SharedMemory via {{variable.path}} templates; they are resolved before the call is made.";

/// Runs the Probe Planner after one UI action, possibly returning zero
/// probes.
pub async fn run(
    model: &dyn ChatModel,
    input: ProbePlannerInput<'_>,
) -> Result<(ProbePlannerOutput, ModelUsage), AgentError> {
    if input.sdom.looks_like_pure_form_input() {
        return Ok((ProbePlannerOutput::default(), ModelUsage::default()));
    }

    let contract = AgentContract::new(
        "emit_probes",
        "Selects zero or more read-only probes to run after the last action.",
        schema(),
    );

    let tool_list: Vec<Value> = input
        .read_only_tools
        .iter()
        .map(|tool| json!({"name": tool.name, "description": tool.description, "parameters": tool.parameters}))
        .collect();

    let prompt = json!({
        "actionTaken": input.action_taken,
        "sdom": input.sdom,
        "sdelta": input.sdelta,
        "goal": input.goal_description,
        "readOnlyTools": tool_list,
        "ids": input.context.ids,
        "credentials": input.context.credentials,
    });

    let messages = vec![
        ModelMessage::System(SYSTEM_PROMPT.to_string()),
        ModelMessage::User(prompt.to_string()),
    ];

    contract.invoke(model, messages).await
}
