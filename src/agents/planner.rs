//! Planner agent (`spec.md` §4.7.2).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::context::PlannerContext;
use crate::error::AgentError;
use crate::llm::contract::AgentContract;
use crate::llm::ChatModel;
use crate::llm::ModelMessage;
use crate::llm::ModelUsage;
use crate::model::{Action, Sdelta, Sdom};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerMode {
    Next,
    Done,
}

pub struct PlannerInput<'a> {
    pub sdom: &'a Sdom,
    pub sdelta: Option<&'a Sdelta>,
    pub context: &'a PlannerContext,
    pub location: &'a str,
    pub critic_hint: Option<&'a str>,
    pub mode: PlannerMode,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PlannerOutput {
    Next {
        reasoning: String,
        action: Action,
    },
    Done {
        reasoning: String,
        #[serde(rename = "evidence_claims")]
        evidence_claims: Vec<String>,
        #[serde(rename = "success_signals")]
        success_signals: Vec<String>,
    },
}

fn schema(mode: PlannerMode) -> Value {
    match mode {
        PlannerMode::Next => json!({
            "type": "object",
            "properties": {
                "mode": { "const": "next" },
                "reasoning": { "type": "string" },
                "action": { "type": "object" }
            },
            "required": ["mode", "reasoning", "action"]
        }),
        PlannerMode::Done => json!({
            "type": "object",
            "properties": {
                "mode": { "const": "done" },
                "reasoning": { "type": "string" },
                "evidence_claims": { "type": "array", "items": { "type": "string" } },
                "success_signals": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["mode", "reasoning", "evidence_claims", "success_signals"]
        }),
    }
}

const SYSTEM_PROMPT: &str = "You are the planner for an end-to-end browser test agent. \
Only act on elements present in the provided SDOM. Prefer a test-id over a CSS selector when both \
are available. For a <select>-like element, use the 'type' action rather than 'click'. \
If a critic hint is present in the prompt, you must address it in this turn's action — do not repeat \
the behavior it calls out. In 'next' mode return one action; in 'done' mode return the evidence \
claims and success signals that justify declaring the goal complete.";

/// Runs the Planner for one step, in either `next` or `done` mode.
pub async fn run(
    model: &dyn ChatModel,
    input: PlannerInput<'_>,
) -> Result<(PlannerOutput, ModelUsage), AgentError> {
    let contract = AgentContract::new(
        "emit_plan",
        "Produces the next action, or a done-mode evidence summary.",
        schema(input.mode),
    );

    let prompt = json!({
        "sdom": input.sdom,
        "sdelta": input.sdelta,
        "credentials": input.context.credentials,
        "ids": input.context.ids,
        "flags": input.context.flags,
        "recentOutcomes": input.context.recent_outcomes,
        "location": input.location,
        "criticHint": input.critic_hint,
        "mode": input.mode,
    });

    let messages = vec![
        ModelMessage::System(SYSTEM_PROMPT.to_string()),
        ModelMessage::User(prompt.to_string()),
    ];

    contract.invoke(model, messages).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PlannerContext;
    use crate::error::ProviderError;
    use crate::llm::{ModelCompletion, ModelToolCall, ModelToolChoice, ModelToolDefinition};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    struct ScriptedModel(Mutex<VecDeque<Result<ModelCompletion, ProviderError>>>);

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn invoke(
            &self,
            _messages: &[ModelMessage],
            _tools: &[ModelToolDefinition],
            _tool_choice: ModelToolChoice,
        ) -> Result<ModelCompletion, ProviderError> {
            self.0.lock().unwrap().pop_front().unwrap()
        }
    }

    fn empty_context() -> PlannerContext {
        PlannerContext {
            credentials: BTreeMap::new(),
            ids: BTreeMap::new(),
            flags: BTreeMap::new(),
            recent_outcomes: vec![],
        }
    }

    #[tokio::test]
    async fn next_mode_returns_an_action() {
        let model = ScriptedModel(Mutex::new(
            vec![Ok(ModelCompletion {
                tool_calls: vec![ModelToolCall {
                    id: "1".to_string(),
                    name: "emit_plan".to_string(),
                    arguments: json!({
                        "mode": "next",
                        "reasoning": "type the email field",
                        "action": {"action": "type", "testId": "email", "text": "a@b.com"}
                    }),
                }],
                ..Default::default()
            })]
            .into(),
        ));

        let sdom = Sdom::default();
        let context = empty_context();

        let (output, _usage) = run(
            &model,
            PlannerInput {
                sdom: &sdom,
                sdelta: None,
                context: &context,
                location: "/login",
                critic_hint: None,
                mode: PlannerMode::Next,
            },
        )
        .await
        .unwrap();

        match output {
            PlannerOutput::Next { action, .. } => {
                assert!(matches!(action, Action::Type { .. }));
            }
            PlannerOutput::Done { .. } => panic!("expected next-mode output"),
        }
    }
}
