//! The Run object (`spec.md` §3, §4.9): owns every run-scoped component and
//! drives the Observe → GoalCheck → Plan → Guard → Act → ProbePlan →
//! ProbeExecute → Validate → Critic loop for one scenario execution.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::actor::UiActor;
use crate::agents::{self, PlannerMode, PlannerOutput};
use crate::context::ContextAssembler;
use crate::critic::{self, DoneDeclarationDecision, NextActionDecision};
use crate::error::{GuardError, RunError};
use crate::evidence::EvidenceStore;
use crate::events::{EventSink, RunEvent};
use crate::guard::PolicyGuard;
use crate::llm::cost::cost_usd;
use crate::llm::{ChatModel, ModelUsage};
use crate::mcp::ToolRegistry;
use crate::model::{
    Action, Budgets, Precondition, Record, RunRecord, RunStatus, ScenarioResult, ScenarioSpec,
    SharedMemory, StepResult, ToolDescriptor, ValidationOutcome,
};
use crate::probe;

/// Message sent to the browser collaborator once per [`Run`] on drop
/// (`spec.md` §5). Context-scoped: only the context this run opened is torn
/// down, not the whole browser service.
const BROWSER_RESET_TOOL: &str = "browser.reset";

/// Owns every run-scoped component for one scenario execution. Construct one
/// per scenario; on drop it fires a best-effort, exactly-once browser reset.
pub struct Run {
    registry: Arc<ToolRegistry>,
    model: Arc<dyn ChatModel>,
    model_name: String,
    budgets: Budgets,
    memory: SharedMemory,
    evidence: EvidenceStore,
    record: RunRecord,
    controller: crate::controller::PhaseController,
    guard: PolicyGuard,
    context_id: String,
    sink: Box<dyn EventSink>,
    reset_sent: bool,
}

impl Run {
    pub fn new(
        registry: Arc<ToolRegistry>,
        model: Arc<dyn ChatModel>,
        model_name: impl Into<String>,
        budgets: Budgets,
        allowed_hosts: HashSet<String>,
        context_id: impl Into<String>,
        sink: Box<dyn EventSink>,
    ) -> Self {
        Self {
            registry,
            model,
            model_name: model_name.into(),
            budgets,
            memory: SharedMemory::new(),
            evidence: EvidenceStore::new(),
            record: RunRecord::new(),
            controller: crate::controller::PhaseController::new(),
            guard: PolicyGuard::new(allowed_hosts),
            context_id: context_id.into(),
            sink,
            reset_sent: false,
        }
    }

    fn emit(&mut self, event: RunEvent) {
        if let Err(err) = self.sink.emit(&event) {
            warn!(error = %err, "failed to emit run event");
        }
    }

    fn record_cost(&mut self, usage: ModelUsage) -> f64 {
        let cost = cost_usd(&self.model_name, usage);
        self.budgets.record_cost(cost);
        cost
    }

    /// Checked before every individual LLM call (`spec.md` §4.9: "before
    /// every LLM call, verify costUsed ≤ costMax").
    fn ensure_cost_budget(&self) -> Result<(), RunError> {
        if self.budgets.cost_budget_exhausted() {
            return Err(RunError::Budget("Cost limit exceeded".to_string()));
        }
        Ok(())
    }

    /// Checked once per loop iteration before the Planner is invoked, so a
    /// scenario with no steps left to spend never reaches planning
    /// (`spec.md` §8 scenario S6).
    fn ensure_step_and_wall_budgets(&self) -> Result<(), RunError> {
        if self.budgets.step_budget_exhausted() {
            return Err(RunError::Budget(
                "Max steps reached without success".to_string(),
            ));
        }
        if self.budgets.wall_clock_exhausted() {
            return Err(RunError::Budget("Wall-clock limit exceeded".to_string()));
        }
        Ok(())
    }

    /// Runs one scenario end to end, returning its terminal [`ScenarioResult`].
    #[instrument(skip(self, scenario), fields(scenario_id = %scenario.id))]
    pub async fn run_scenario(&mut self, scenario: &ScenarioSpec) -> ScenarioResult {
        self.emit(RunEvent::RunStart {
            timestamp: Utc::now(),
            run_id: self.context_id.clone(),
        });
        self.emit(RunEvent::ScenarioStart {
            timestamp: Utc::now(),
            scenario_id: scenario.id.clone(),
            goal: scenario.goal.description.clone(),
        });

        if let Err(message) = scenario.validate() {
            return self.finish(RunStatus::Error, Some(message));
        }

        if let Err(err) = self.run_preconditions(scenario).await {
            return self.finish(RunStatus::Error, Some(err.to_string()));
        }

        let nav_action = Action::Navigate {
            url: scenario.context.start_url.clone(),
        };
        let dispatch = UiActor::new(&self.registry, self.context_id.clone())
            .dispatch(&nav_action, &crate::model::Sdom::default())
            .await;
        if !dispatch.success {
            return self.finish(
                RunStatus::Error,
                Some(dispatch.error.unwrap_or_else(|| "navigation failed".to_string())),
            );
        }

        let mut observation = match self.observe(None, None).await {
            Ok(observation) => observation,
            Err(err) => return self.finish(RunStatus::Error, Some(err.to_string())),
        };

        let mut step: u32 = 0;

        loop {
            if let Err(err) = self.ensure_cost_budget() {
                return self.finish(RunStatus::Error, Some(err.to_string()));
            }

            let critic_view = ContextAssembler::critic_view(&self.evidence);
            let (goal_check, goal_usage) = match agents::check_goal(
                self.model.as_ref(),
                agents::GoalCheckInput {
                    goal_description: &scenario.goal.description,
                    context: &critic_view,
                    sdelta: observation.sdelta.as_ref(),
                    location: &observation.location,
                },
            )
            .await
            {
                Ok(result) => result,
                Err(err) => return self.finish(RunStatus::Error, Some(err.to_string())),
            };
            self.record_cost(goal_usage);
            self.emit(RunEvent::GoalCheck {
                timestamp: Utc::now(),
                goal_met: goal_check.goal_met,
                confidence: goal_check.confidence,
                reasoning: goal_check.reasoning.clone(),
            });

            if let Err(err) = self.ensure_step_and_wall_budgets() {
                return self.finish(RunStatus::Error, Some(err.to_string()));
            }

            let hint = self.controller.take_hint().or_else(|| {
                if goal_check.goal_met && goal_check.confidence >= 0.7 {
                    Some(format!(
                        "The goal checker believes the goal may already be met (confidence {:.2}): {}. \
                         If so, emit goal.complete citing supporting evidence ids such as {:?}.",
                        goal_check.confidence, goal_check.reasoning, goal_check.suggested_evidence
                    ))
                } else {
                    None
                }
            });

            if let Err(err) = self.ensure_cost_budget() {
                return self.finish(RunStatus::Error, Some(err.to_string()));
            }

            let planner_view = ContextAssembler::planner_view(&self.memory, &self.evidence);
            let (plan_output, plan_usage) = match agents::plan(
                self.model.as_ref(),
                agents::PlannerInput {
                    sdom: &observation.sdom,
                    sdelta: observation.sdelta.as_ref(),
                    context: &planner_view,
                    location: &observation.location,
                    critic_hint: hint.as_deref(),
                    mode: PlannerMode::Next,
                },
            )
            .await
            {
                Ok(result) => result,
                Err(err) => return self.finish(RunStatus::Error, Some(err.to_string())),
            };
            let plan_cost = self.record_cost(plan_usage);

            let (plan_reasoning, action) = match plan_output {
                PlannerOutput::Next { reasoning, action } => (reasoning, action),
                PlannerOutput::Done { .. } => {
                    return self.finish(
                        RunStatus::Error,
                        Some("planner returned done-mode output in next mode".to_string()),
                    );
                }
            };

            if action.is_sentinel() {
                match action {
                    Action::GoalFail => {
                        return self.finish(
                            RunStatus::Failure,
                            Some(plan_reasoning),
                        );
                    }
                    Action::GoalComplete => {
                        match self.declare_done(scenario, &observation, step).await {
                            Ok(Some(result)) => return result,
                            Ok(None) => continue,
                            Err(err) => return self.finish(RunStatus::Error, Some(err.to_string())),
                        }
                    }
                    _ => unreachable!("only sentinel actions reach this branch"),
                }
            }

            if let Err(guard_err) = self.guard.check(&action, &self.budgets, &observation.sdom) {
                return self.finish(RunStatus::Error, Some(self.guard_failure_message(&guard_err)));
            }

            self.budgets.record_step();

            let dispatch = UiActor::new(&self.registry, self.context_id.clone())
                .dispatch(&action, &observation.sdom)
                .await;

            if let Some(stagnation_hint) = self.controller.record_action(&action) {
                self.controller.set_hint(stagnation_hint);
            }

            let new_observation = match self.observe(Some(&observation), Some(&action)).await {
                Ok(observation) => observation,
                Err(err) => return self.finish(RunStatus::Error, Some(err.to_string())),
            };

            if let Err(err) = self.ensure_cost_budget() {
                return self.finish(RunStatus::Error, Some(err.to_string()));
            }

            let read_only_tools = self.registry.read_only_tools();
            let (probe_output, probe_usage) = match agents::plan_probes(
                self.model.as_ref(),
                agents::ProbePlannerInput {
                    action_taken: &action,
                    sdom: &new_observation.sdom,
                    sdelta: new_observation.sdelta.as_ref(),
                    goal_description: &scenario.goal.description,
                    read_only_tools: &read_only_tools,
                    context: &planner_view,
                },
            )
            .await
            {
                Ok(result) => result,
                Err(err) => return self.finish(RunStatus::Error, Some(err.to_string())),
            };
            let probe_cost = self.record_cost(probe_usage);

            let probe_results = probe::run_probes(&self.registry, &probe_output.probes, &self.memory).await;

            if let Err(err) = self.ensure_cost_budget() {
                return self.finish(RunStatus::Error, Some(err.to_string()));
            }

            let validator_view = ContextAssembler::validator_view(&self.memory);
            let (validator_output, validator_usage) = match agents::validate(
                self.model.as_ref(),
                agents::ValidatorInput {
                    action: &action,
                    goal_description: &scenario.goal.description,
                    sdom: &new_observation.sdom,
                    sdelta: new_observation.sdelta.as_ref(),
                    probe_results: &probe_results,
                    context: &validator_view,
                    step,
                    location: &new_observation.location,
                },
            )
            .await
            {
                Ok(result) => result,
                Err(err) => return self.finish(RunStatus::Error, Some(err.to_string())),
            };
            let validator_cost = self.record_cost(validator_usage);

            let outcome = ValidationOutcome {
                id: Uuid::new_v4().to_string(),
                step,
                timestamp: Utc::now(),
                passed: validator_output.passed,
                confidence: validator_output.confidence,
                reasoning: validator_output.reasoning.clone(),
                evidence: validator_output.evidence.clone(),
                concerns: validator_output.concerns.clone(),
                probe_results,
                location: new_observation.location.clone(),
                sdom: new_observation.sdom.clone(),
                sdelta: new_observation.sdelta.clone(),
            };

            if let Err(message) = self.evidence.append(outcome.clone()) {
                return self.finish(RunStatus::Error, Some(message));
            }
            self.emit(RunEvent::ValidationOutcomeEvent {
                timestamp: Utc::now(),
                outcome: outcome.clone(),
            });

            let step_cost = plan_cost + probe_cost + validator_cost;
            let combined_usage = ModelUsage {
                input_tokens: plan_usage.input_tokens + probe_usage.input_tokens + validator_usage.input_tokens,
                output_tokens: plan_usage.output_tokens
                    + probe_usage.output_tokens
                    + validator_usage.output_tokens,
            };

            self.record.push(StepResult {
                step,
                observation: new_observation.clone(),
                action: action.clone(),
                plan_reasoning: plan_reasoning.clone(),
                token_usage: combined_usage,
                cost_usd: step_cost,
                server_time: Utc::now(),
            });
            self.emit(RunEvent::Step {
                timestamp: Utc::now(),
                step,
                action,
                observation: new_observation.clone(),
                reasoning: plan_reasoning,
                cost_usd: step_cost,
            });

            let decision = critic::decide_next_action(&outcome);
            self.emit(RunEvent::CriticDecision {
                timestamp: Utc::now(),
                decision: critic_decision_label(&decision),
                hint: critic_decision_hint(&decision),
            });

            match decision {
                NextActionDecision::Continue => {}
                NextActionDecision::Retry { hint } => self.controller.set_hint(hint),
                NextActionDecision::Failure { hint } => {
                    return self.finish(RunStatus::Failure, Some(hint));
                }
            }

            observation = new_observation;
            step += 1;
        }
    }

    /// Handles a `goal.complete` sentinel: re-invokes the Planner in `done`
    /// mode to obtain evidence claims, then has the Critic adjudicate them.
    /// Returns `Ok(Some(result))` to terminate, `Ok(None)` to loop back to
    /// Observe after recording a retry hint.
    async fn declare_done(
        &mut self,
        scenario: &ScenarioSpec,
        observation: &crate::model::Observation,
        step: u32,
    ) -> Result<Option<ScenarioResult>, RunError> {
        self.ensure_cost_budget()?;

        let planner_view = ContextAssembler::planner_view(&self.memory, &self.evidence);
        let (done_output, done_usage) = agents::plan(
            self.model.as_ref(),
            agents::PlannerInput {
                sdom: &observation.sdom,
                sdelta: observation.sdelta.as_ref(),
                context: &planner_view,
                location: &observation.location,
                critic_hint: None,
                mode: PlannerMode::Done,
            },
        )
        .await?;
        self.record_cost(done_usage);

        let evidence_claims = match done_output {
            PlannerOutput::Done { evidence_claims, .. } => evidence_claims,
            PlannerOutput::Next { .. } => {
                return Err(RunError::Invariant(
                    "planner returned next-mode output in done mode".to_string(),
                ));
            }
        };

        let decision = critic::decide_done_declaration(&evidence_claims, &self.evidence, step);
        self.emit(RunEvent::CriticDecision {
            timestamp: Utc::now(),
            decision: match &decision {
                DoneDeclarationDecision::Success => "success".to_string(),
                DoneDeclarationDecision::Retry { .. } => "retry".to_string(),
            },
            hint: match &decision {
                DoneDeclarationDecision::Success => None,
                DoneDeclarationDecision::Retry { hint } => Some(hint.clone()),
            },
        });

        match decision {
            DoneDeclarationDecision::Success => Ok(Some(self.finish(RunStatus::Success, None))),
            DoneDeclarationDecision::Retry { hint } => {
                self.controller.set_hint(hint);
                Ok(None)
            }
        }
    }

    /// Executes every precondition in order, populating `SharedMemory` before
    /// the scenario's first navigation (`spec.md` §4.7.1).
    async fn run_preconditions(&mut self, scenario: &ScenarioSpec) -> Result<(), RunError> {
        for precondition in &scenario.preconditions {
            match precondition {
                Precondition::Instruction { instruction, store_as } => {
                    self.ensure_cost_budget()?;

                    let all_tools: Vec<&ToolDescriptor> = self.registry.all().collect();
                    let mutating_tools: Vec<&ToolDescriptor> = all_tools
                        .into_iter()
                        .filter(|tool| !tool.read_only && !tool.is_ui_action())
                        .collect();

                    let (output, usage) = agents::precondition(
                        self.model.as_ref(),
                        agents::PreconditionerInput {
                            instruction,
                            mutating_tools: &mutating_tools,
                        },
                    )
                    .await?;
                    self.record_cost(usage);

                    let resolved_params = probe::resolve_templates(&output.params, &self.memory);
                    let result = self.registry.call(&output.tool, resolved_params).await?;

                    let name = store_as.clone().unwrap_or_else(|| output.suggested_name.clone());
                    self.memory.insert(name.clone(), value_to_record(result));

                    self.emit(RunEvent::Precondition {
                        timestamp: Utc::now(),
                        instruction: instruction.clone(),
                        tool: output.tool.clone(),
                        stored_as: name,
                    });
                }
                Precondition::Mcp { mcp, params, store_as } => {
                    let raw_params = params.clone().unwrap_or(Value::Null);
                    let resolved_params = probe::resolve_templates(&raw_params, &self.memory);
                    let result = self.registry.call(mcp, resolved_params).await?;

                    let name = store_as.clone().unwrap_or_else(|| mcp.clone());
                    self.memory.insert(name.clone(), value_to_record(result));

                    self.emit(RunEvent::Precondition {
                        timestamp: Utc::now(),
                        instruction: format!("mcp:{mcp}"),
                        tool: mcp.clone(),
                        stored_as: name,
                    });
                }
            }
        }
        Ok(())
    }

    /// Calls `ui.observe`, diffing the result against `previous` when given.
    async fn observe(
        &self,
        previous: Option<&crate::model::Observation>,
        last_action: Option<&Action>,
    ) -> Result<crate::model::Observation, RunError> {
        let mut args = json!({ "contextId": self.context_id });
        if let Some(action) = last_action {
            args["lastAction"] = serde_json::to_value(action)
                .map_err(|err| RunError::Invariant(format!("action did not serialize: {err}")))?;
        }

        let value = self.registry.call("ui.observe", args).await?;
        let mut observation: crate::model::Observation = serde_json::from_value(value)
            .map_err(|err| RunError::Invariant(format!("ui.observe response malformed: {err}")))?;

        if let Some(previous) = previous {
            observation.sdelta = Some(crate::model::Sdelta::diff(
                &previous.sdom,
                &previous.location,
                &observation.sdom,
                &observation.location,
            ));
        }

        Ok(observation)
    }

    fn guard_failure_message(&self, err: &GuardError) -> String {
        match err {
            GuardError::StepBudgetExhausted { .. } => "Max steps reached without success".to_string(),
            GuardError::CostBudgetExhausted { .. } => "Cost limit exceeded".to_string(),
            other => other.to_string(),
        }
    }

    fn finish(&mut self, status: RunStatus, error: Option<String>) -> ScenarioResult {
        let result = ScenarioResult {
            status,
            total_steps: self.record.total_steps(),
            duration_seconds: self.budgets.elapsed_seconds() as f64,
            total_cost_usd: self.budgets.cost_used,
            error,
        };

        info!(status = ?result.status, total_steps = result.total_steps, "scenario finished");

        self.emit(RunEvent::ScenarioEnd {
            timestamp: Utc::now(),
            result: result.clone(),
        });
        self.emit(RunEvent::RunEnd {
            timestamp: Utc::now(),
            exit_code: RunEvent::exit_code_for(result.status),
        });

        result
    }
}

fn value_to_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

fn critic_decision_label(decision: &NextActionDecision) -> String {
    match decision {
        NextActionDecision::Continue => "continue".to_string(),
        NextActionDecision::Retry { .. } => "retry".to_string(),
        NextActionDecision::Failure { .. } => "failure".to_string(),
    }
}

fn critic_decision_hint(decision: &NextActionDecision) -> Option<String> {
    match decision {
        NextActionDecision::Continue => None,
        NextActionDecision::Retry { hint } | NextActionDecision::Failure { hint } => Some(hint.clone()),
    }
}

impl Drop for Run {
    /// Best-effort, exactly-once, fire-and-forget browser reset
    /// (`spec.md` §5, §8 invariant 6). Runs detached so a slow or failing
    /// collaborator never blocks the Run's own teardown.
    fn drop(&mut self) {
        if self.reset_sent {
            return;
        }
        self.reset_sent = true;

        let registry = Arc::clone(&self.registry);
        let context_id = self.context_id.clone();
        tokio::spawn(async move {
            if let Err(err) = registry
                .call(BROWSER_RESET_TOOL, json!({ "contextId": context_id }))
                .await
            {
                warn!(error = %err, "best-effort browser reset failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::events::RecordingEventSink;
    use crate::llm::{ModelCompletion, ModelMessage, ModelToolCall, ModelToolChoice, ModelToolDefinition};
    use crate::mcp::transport::mock::MockMcpTransport;
    use crate::mcp::wire::{RawToolDescriptor, ToolContentBlock, ToolsCallResult, ToolsListResult};
    use crate::model::{Constraints, Goal, ScenarioContext};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn raw(name: &str) -> RawToolDescriptor {
        RawToolDescriptor {
            name: name.to_string(),
            description: String::new(),
            parameters: json!({"type": "object"}),
            read_only_hint: None,
        }
    }

    fn text_result(value: Value) -> ToolsCallResult {
        ToolsCallResult {
            content: vec![ToolContentBlock::Text {
                text: value.to_string(),
            }],
            is_error: false,
        }
    }

    fn tool_call(name: &str, arguments: Value) -> ModelCompletion {
        ModelCompletion {
            tool_calls: vec![ModelToolCall {
                id: "1".to_string(),
                name: name.to_string(),
                arguments,
            }],
            ..Default::default()
        }
    }

    struct ScriptedModel(Mutex<VecDeque<Result<ModelCompletion, ProviderError>>>);

    impl ScriptedModel {
        fn new(responses: Vec<ModelCompletion>) -> Self {
            Self(Mutex::new(responses.into_iter().map(Ok).collect()))
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn invoke(
            &self,
            _messages: &[ModelMessage],
            _tools: &[ModelToolDefinition],
            _tool_choice: ModelToolChoice,
        ) -> Result<ModelCompletion, ProviderError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted model ran out of responses")
        }
    }

    fn base_scenario() -> ScenarioSpec {
        ScenarioSpec {
            version: "1".to_string(),
            id: "s1".to_string(),
            goal: Goal {
                description: "Log in and reach dashboard".to_string(),
                success: "dashboard is visible".to_string(),
                hints: None,
            },
            context: ScenarioContext {
                start_url: "http://localhost:5173/login".to_string(),
            },
            preconditions: vec![],
            constraints: Constraints {
                max_steps: 10,
                max_cost_usd: 0.5,
                max_wall_seconds: None,
            },
        }
    }

    async fn registry_with(call_results: Vec<ToolsCallResult>) -> Arc<ToolRegistry> {
        let browser = MockMcpTransport::new();
        browser.push_list(Ok(ToolsListResult {
            tools: vec![
                raw("ui.navigate"),
                raw("ui.observe"),
                raw("ui.act.click"),
                raw("ui.act.type"),
                raw("browser.reset"),
            ],
        }));
        for result in call_results {
            browser.push_call(Ok(result));
        }
        let data = MockMcpTransport::new();
        data.push_list(Ok(ToolsListResult { tools: vec![] }));

        Arc::new(ToolRegistry::bootstrap(Box::new(browser), Box::new(data)).await.unwrap())
    }

    fn observe_response(location: &str) -> Value {
        json!({
            "location": location,
            "page_title": "Dashboard",
            "sdom": {"interactive": [], "content": [], "feedback": []}
        })
    }

    fn observe_response_with_test_ids(location: &str, test_ids: &[&str]) -> Value {
        let interactive: Vec<Value> = test_ids
            .iter()
            .map(|id| json!({"kind": "input", "label": *id, "testId": id, "value": "", "disabled": false, "required": false}))
            .collect();
        json!({
            "location": location,
            "page_title": "Dashboard",
            "sdom": {"interactive": interactive, "content": [], "feedback": []}
        })
    }

    #[tokio::test]
    async fn zero_step_budget_errors_before_planning() {
        let registry = registry_with(vec![
            text_result(json!({})),
            text_result(observe_response("/login")),
        ])
        .await;
        let model = Arc::new(ScriptedModel::new(vec![]));
        let mut scenario = base_scenario();
        scenario.constraints.max_steps = 0;

        let mut run = Run::new(
            registry,
            model,
            "gpt-4o-mini",
            Budgets::new(0, 0.5, None),
            ["localhost"].into_iter().map(str::to_string).collect(),
            "ctx-s6",
            Box::new(RecordingEventSink::default()),
        );

        let result = run.run_scenario(&scenario).await;
        assert_eq!(result.status, RunStatus::Error);
        assert_eq!(result.error.as_deref(), Some("Max steps reached without success"));
    }

    #[tokio::test]
    async fn tiny_cost_budget_errors_after_first_planner_call_before_dispatch() {
        let registry = registry_with(vec![
            text_result(json!({})),
            text_result(observe_response("/login")),
        ])
        .await;
        let model = Arc::new(ScriptedModel::new(vec![tool_call(
            "emit_plan",
            json!({
                "mode": "next",
                "reasoning": "type the email field",
                "action": {"action": "type", "testId": "email", "text": "a@b.com"}
            }),
        )]));

        let mut run = Run::new(
            registry,
            model,
            "gpt-4o-mini",
            Budgets::new(10, 0.000001, None),
            ["localhost"].into_iter().map(str::to_string).collect(),
            "ctx-s4",
            Box::new(RecordingEventSink::default()),
        );

        let result = run.run_scenario(&base_scenario()).await;
        assert_eq!(result.status, RunStatus::Error);
        assert_eq!(result.error.as_deref(), Some("Cost limit exceeded"));
        assert_eq!(result.total_steps, 0);
    }

    #[tokio::test]
    async fn planner_goal_fail_sentinel_terminates_as_failure() {
        let registry = registry_with(vec![
            text_result(json!({})),
            text_result(observe_response("/login")),
        ])
        .await;
        let model = Arc::new(ScriptedModel::new(vec![tool_call(
            "emit_plan",
            json!({
                "mode": "next",
                "reasoning": "the login form is broken beyond recovery",
                "action": {"action": "goal.fail"}
            }),
        )]));

        let mut run = Run::new(
            registry,
            model,
            "gpt-4o-mini",
            Budgets::new(10, 0.5, None),
            ["localhost"].into_iter().map(str::to_string).collect(),
            "ctx-fail",
            Box::new(RecordingEventSink::default()),
        );

        let result = run.run_scenario(&base_scenario()).await;
        assert_eq!(result.status, RunStatus::Failure);
    }

    /// A `ChatModel` backed by a queue of closures rather than canned
    /// responses, for scripting calls whose expected arguments depend on
    /// runtime-generated state (e.g. a `ValidationOutcome`'s UUID) that can't
    /// be known ahead of time.
    struct DynamicModel(Mutex<VecDeque<Box<dyn Fn(&[ModelMessage]) -> ModelCompletion + Send>>>);

    impl DynamicModel {
        fn new(responses: Vec<Box<dyn Fn(&[ModelMessage]) -> ModelCompletion + Send>>) -> Self {
            Self(Mutex::new(responses.into()))
        }
    }

    #[async_trait]
    impl ChatModel for DynamicModel {
        async fn invoke(
            &self,
            messages: &[ModelMessage],
            _tools: &[ModelToolDefinition],
            _tool_choice: ModelToolChoice,
        ) -> Result<ModelCompletion, ProviderError> {
            let respond = self
                .0
                .lock()
                .unwrap()
                .pop_front()
                .expect("dynamic model ran out of responses");
            Ok(respond(messages))
        }
    }

    fn fixed(completion: ModelCompletion) -> Box<dyn Fn(&[ModelMessage]) -> ModelCompletion + Send> {
        Box::new(move |_messages| completion.clone())
    }

    fn last_user_json(messages: &[ModelMessage]) -> Value {
        messages
            .iter()
            .rev()
            .find_map(|message| match message {
                ModelMessage::User(text) => serde_json::from_str::<Value>(text).ok(),
                _ => None,
            })
            .expect("no JSON user message in prompt")
    }

    /// Extracts the id of the most recent cited outcome from a Planner or
    /// Probe Planner prompt's `recentOutcomes` array.
    fn last_outcome_id(messages: &[ModelMessage]) -> String {
        last_user_json(messages)["recentOutcomes"]
            .as_array()
            .and_then(|outcomes| outcomes.last())
            .and_then(|outcome| outcome["id"].as_str())
            .expect("no recent outcome id in prompt")
            .to_string()
    }

    /// A `ChatModel` that records every prompt it receives alongside its
    /// canned responses, so a test can assert on what a later call was
    /// actually shown (e.g. that a stagnation hint was injected).
    struct RecordingModel {
        responses: Mutex<VecDeque<ModelCompletion>>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingModel {
        fn new(responses: Vec<ModelCompletion>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn invoke(
            &self,
            messages: &[ModelMessage],
            _tools: &[ModelToolDefinition],
            _tool_choice: ModelToolChoice,
        ) -> Result<ModelCompletion, ProviderError> {
            if let Some(text) = messages.iter().rev().find_map(|message| match message {
                ModelMessage::User(text) => Some(text.clone()),
                _ => None,
            }) {
                self.prompts.lock().unwrap().push(text);
            }
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("recording model ran out of responses"))
        }
    }

    async fn registry_with_browser_and_data(
        browser_calls: Vec<ToolsCallResult>,
        data_tool: &str,
        data_read_only: bool,
        data_calls: Vec<ToolsCallResult>,
    ) -> Arc<ToolRegistry> {
        let browser = MockMcpTransport::new();
        browser.push_list(Ok(ToolsListResult {
            tools: vec![
                raw("ui.navigate"),
                raw("ui.observe"),
                raw("ui.act.click"),
                raw("ui.act.type"),
                raw("browser.reset"),
            ],
        }));
        for result in browser_calls {
            browser.push_call(Ok(result));
        }

        let data = MockMcpTransport::new();
        data.push_list(Ok(ToolsListResult {
            tools: vec![RawToolDescriptor {
                name: data_tool.to_string(),
                description: String::new(),
                parameters: json!({"type": "object"}),
                read_only_hint: Some(data_read_only),
            }],
        }));
        for result in data_calls {
            data.push_call(Ok(result));
        }

        Arc::new(ToolRegistry::bootstrap(Box::new(browser), Box::new(data)).await.unwrap())
    }

    /// S1 (`spec.md` §8): a single successful step followed by the Planner
    /// declaring `goal.complete`, citing the step's own outcome, and the
    /// Critic accepting the done declaration.
    #[tokio::test]
    async fn happy_path_completes_via_goal_complete_and_done_declaration() {
        let registry = registry_with(vec![
            text_result(json!({})),
            text_result(observe_response_with_test_ids("/login", &["username"])),
            text_result(json!({})),
            text_result(observe_response_with_test_ids("/dashboard", &["username"])),
        ])
        .await;

        let model = Arc::new(DynamicModel::new(vec![
            fixed(tool_call(
                "emit_plan",
                json!({
                    "mode": "next",
                    "reasoning": "fill in the username",
                    "action": {"action": "type", "testId": "username", "text": "alice"}
                }),
            )),
            fixed(tool_call(
                "emit_validation",
                json!({
                    "passed": true,
                    "confidence": 0.95,
                    "reasoning": "dashboard now shows the username field populated",
                    "evidence": ["username field shows 'alice'"],
                    "concerns": []
                }),
            )),
            fixed(tool_call(
                "emit_goal_check",
                json!({
                    "goalMet": true,
                    "confidence": 0.9,
                    "reasoning": "dashboard is visible with the username populated",
                    "suggestedEvidence": []
                }),
            )),
            fixed(tool_call(
                "emit_plan",
                json!({
                    "mode": "next",
                    "reasoning": "the dashboard confirms the goal",
                    "action": {"action": "goal.complete"}
                }),
            )),
            Box::new(|messages: &[ModelMessage]| {
                let id = last_outcome_id(messages);
                tool_call(
                    "emit_plan",
                    json!({
                        "mode": "done",
                        "reasoning": "the username outcome confirms completion",
                        "evidence_claims": [id],
                        "success_signals": ["dashboard visible"]
                    }),
                )
            }),
        ]));

        let mut run = Run::new(
            registry,
            model,
            "gpt-4o-mini",
            Budgets::new(10, 0.5, None),
            ["localhost"].into_iter().map(str::to_string).collect(),
            "ctx-s1",
            Box::new(RecordingEventSink::default()),
        );

        let result = run.run_scenario(&base_scenario()).await;
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.total_steps, 1);
        assert!(result.error.is_none());
    }

    /// S2 (`spec.md` §8): a click whose SDOM diff looks fine but whose
    /// backend probe contradicts it; the Critic must treat a passing probe
    /// plus a mismatch concern as a critical failure, not a retry.
    #[tokio::test]
    async fn ui_backend_mismatch_with_successful_probe_is_critical_failure() {
        let registry = registry_with_browser_and_data(
            vec![
                text_result(json!({})),
                text_result(json!({
                    "location": "/profile",
                    "page_title": "Profile",
                    "sdom": {
                        "interactive": [{"kind": "button", "label": "View Profile", "testId": "view-profile", "value": null, "disabled": false, "required": false}],
                        "content": [],
                        "feedback": []
                    }
                })),
                text_result(json!({})),
                text_result(json!({
                    "location": "/profile",
                    "page_title": "Profile",
                    "sdom": {
                        "interactive": [{"kind": "button", "label": "View Profile", "testId": "view-profile", "value": null, "disabled": false, "required": false}],
                        "content": [{"kind": "heading", "level": 2, "text": "Profile: x@y.com"}],
                        "feedback": []
                    }
                })),
            ],
            "data.user.get",
            true,
            vec![text_result(json!({"email": "a@b.com"}))],
        )
        .await;

        let model = Arc::new(ScriptedModel::new(vec![
            tool_call(
                "emit_plan",
                json!({
                    "mode": "next",
                    "reasoning": "open the profile view",
                    "action": {"action": "click", "testId": "view-profile"}
                }),
            ),
            tool_call(
                "emit_probes",
                json!({
                    "probes": [{"tool": "data.user.get", "params": {"id": "u-1"}}]
                }),
            ),
            tool_call(
                "emit_validation",
                json!({
                    "passed": false,
                    "confidence": 0.85,
                    "reasoning": "profile email does not match backend",
                    "evidence": ["UI shows 'x@y.com'"],
                    "concerns": ["UI shows 'x@y.com' but backend shows 'a@b.com'"]
                }),
            ),
        ]));

        let mut run = Run::new(
            registry,
            model,
            "gpt-4o-mini",
            Budgets::new(10, 0.5, None),
            ["localhost"].into_iter().map(str::to_string).collect(),
            "ctx-s2",
            Box::new(RecordingEventSink::default()),
        );

        let result = run.run_scenario(&base_scenario()).await;
        assert_eq!(result.status, RunStatus::Failure);
        assert!(result.error.as_deref().unwrap().contains("CRITICAL BUG DETECTED"));
        assert!(result.error.as_deref().unwrap().contains("backend shows"));
    }

    /// S3 (`spec.md` §8): a Planner that keeps clicking the same element
    /// despite the injected stagnation hint eventually exhausts the step
    /// budget rather than looping forever.
    #[tokio::test]
    async fn stagnating_planner_ignores_hint_and_exhausts_step_budget() {
        let registry = registry_with(vec![
            text_result(json!({})),
            text_result(observe_response_with_test_ids("/app", &["submit"])),
            text_result(json!({})),
            text_result(observe_response_with_test_ids("/app", &["submit"])),
            text_result(json!({})),
            text_result(observe_response_with_test_ids("/app", &["submit"])),
            text_result(json!({})),
            text_result(observe_response_with_test_ids("/app", &["submit"])),
            text_result(json!({})),
            text_result(observe_response_with_test_ids("/app", &["submit"])),
        ])
        .await;

        fn click_submit() -> ModelCompletion {
            tool_call(
                "emit_plan",
                json!({
                    "mode": "next",
                    "reasoning": "click submit again",
                    "action": {"action": "click", "testId": "submit"}
                }),
            )
        }

        fn pass() -> ModelCompletion {
            tool_call(
                "emit_validation",
                json!({
                    "passed": true,
                    "confidence": 0.9,
                    "reasoning": "nothing observably changed",
                    "evidence": [],
                    "concerns": []
                }),
            )
        }

        fn goal_not_met() -> ModelCompletion {
            tool_call(
                "emit_goal_check",
                json!({
                    "goalMet": false,
                    "confidence": 0.1,
                    "reasoning": "still on the same page",
                    "suggestedEvidence": []
                }),
            )
        }

        let model = Arc::new(RecordingModel::new(vec![
            click_submit(),
            pass(),
            goal_not_met(),
            click_submit(),
            pass(),
            goal_not_met(),
            click_submit(),
            pass(),
            goal_not_met(),
            click_submit(),
            pass(),
            goal_not_met(),
        ]));

        let mut scenario = base_scenario();
        scenario.constraints.max_steps = 4;

        let mut run = Run::new(
            registry,
            model.clone(),
            "gpt-4o-mini",
            Budgets::new(4, 0.5, None),
            ["localhost"].into_iter().map(str::to_string).collect(),
            "ctx-s3",
            Box::new(RecordingEventSink::default()),
        );

        let result = run.run_scenario(&scenario).await;
        assert_eq!(result.status, RunStatus::Error);
        assert_eq!(result.error.as_deref(), Some("Max steps reached without success"));
        assert_eq!(result.total_steps, 4);

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts
            .iter()
            .any(|prompt| prompt.contains("You have repeated click on 'submit' three times in a row")));
    }
}
