//! Semantic Validator agent (`spec.md` §4.7.4).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::context::ValidatorContext;
use crate::error::AgentError;
use crate::llm::contract::AgentContract;
use crate::llm::ChatModel;
use crate::llm::ModelMessage;
use crate::llm::ModelUsage;
use crate::model::{Action, ProbeResult, Sdelta, Sdom};

pub struct ValidatorInput<'a> {
    pub action: &'a Action,
    pub goal_description: &'a str,
    pub sdom: &'a Sdom,
    pub sdelta: Option<&'a Sdelta>,
    pub probe_results: &'a [ProbeResult],
    pub context: &'a ValidatorContext,
    pub step: u32,
    pub location: &'a str,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidatorOutput {
    pub passed: bool,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "passed": { "type": "boolean" },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "reasoning": { "type": "string" },
            "evidence": { "type": "array", "items": { "type": "string" } },
            "concerns": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["passed", "confidence", "reasoning", "evidence", "concerns"]
    })
}

const SYSTEM_PROMPT: &str = "You are the semantic validator for an end-to-end test agent. \
Given the action that was just taken, the goal, the current page structure (SDOM), its diff from the \
previous page (SDELTA), and any backend probe results, decide whether the action's observable effect \
is consistent with the goal and with backend state. Cite specific values in your evidence, for example \
\"UI email a@b.com matches backend user.email\". You MUST NOT judge whether the overall goal has been \
achieved — only whether this step's effect holds up; overall goal completion is decided elsewhere.";

/// Runs the Semantic Validator for one step, producing the fields that seed
/// a `ValidationOutcome`.
pub async fn run(
    model: &dyn ChatModel,
    input: ValidatorInput<'_>,
) -> Result<(ValidatorOutput, ModelUsage), AgentError> {
    let contract = AgentContract::new(
        "emit_validation",
        "Judges whether the last action's effect is consistent with the goal and backend state.",
        schema(),
    );

    let prompt = json!({
        "action": input.action,
        "goal": input.goal_description,
        "sdom": input.sdom,
        "sdelta": input.sdelta,
        "probeResults": input.probe_results,
        "ids": input.context.ids,
        "flags": input.context.flags,
        "step": input.step,
        "location": input.location,
    });

    let messages = vec![
        ModelMessage::System(SYSTEM_PROMPT.to_string()),
        ModelMessage::User(prompt.to_string()),
    ];

    contract.invoke(model, messages).await
}
