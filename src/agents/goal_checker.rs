//! Goal Checker agent (`spec.md` §4.7.5).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::context::CriticContext;
use crate::error::AgentError;
use crate::llm::contract::AgentContract;
use crate::llm::ChatModel;
use crate::llm::ModelMessage;
use crate::llm::ModelUsage;
use crate::model::Sdelta;

pub struct GoalCheckInput<'a> {
    pub goal_description: &'a str,
    pub context: &'a CriticContext,
    pub sdelta: Option<&'a Sdelta>,
    pub location: &'a str,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoalCheckOutput {
    #[serde(rename = "goalMet")]
    pub goal_met: bool,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(rename = "suggestedEvidence", default)]
    pub suggested_evidence: Vec<String>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "goalMet": { "type": "boolean" },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "reasoning": { "type": "string" },
            "suggestedEvidence": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["goalMet", "confidence", "reasoning", "suggestedEvidence"]
    })
}

const SYSTEM_PROMPT: &str = "You decide whether the scenario's overall goal has been achieved, given \
every validation outcome so far. Weight recent evidence most heavily: a later passing outcome that \
confirms the goal overrides an earlier failing one that merely lacked the data at the time. With zero \
validation outcomes, you must report goalMet=false with low confidence.";

/// Runs the Goal Checker over all validation outcomes so far.
pub async fn run(
    model: &dyn ChatModel,
    input: GoalCheckInput<'_>,
) -> Result<(GoalCheckOutput, ModelUsage), AgentError> {
    if input.context.recent_outcomes.is_empty() {
        return Ok((
            GoalCheckOutput {
                goal_met: false,
                confidence: 0.0,
                reasoning: "no validation outcomes recorded yet".to_string(),
                suggested_evidence: vec![],
            },
            ModelUsage::default(),
        ));
    }

    let contract = AgentContract::new(
        "emit_goal_check",
        "Decides whether the scenario goal has been achieved given outcomes so far.",
        schema(),
    );

    let prompt = json!({
        "goal": input.goal_description,
        "outcomes": input.context.recent_outcomes,
        "sdelta": input.sdelta,
        "location": input.location,
    });

    let messages = vec![
        ModelMessage::System(SYSTEM_PROMPT.to_string()),
        ModelMessage::User(prompt.to_string()),
    ];

    contract.invoke(model, messages).await
}
