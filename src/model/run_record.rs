use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::ModelUsage;
use crate::model::action::Action;
use crate::model::sdom::Observation;

/// One entry of the ordered `RunRecord` sequence (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: u32,
    pub observation: Observation,
    pub action: Action,
    pub plan_reasoning: String,
    pub token_usage: ModelUsage,
    pub cost_usd: f64,
    pub server_time: DateTime<Utc>,
}

/// Terminal disposition of a scenario run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
    Error,
}

impl RunStatus {
    /// CLI exit code per `spec.md` §6: 0 on success, 1 on failure or error.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failure | RunStatus::Error => 1,
        }
    }
}

/// The final summary record emitted once per scenario (`spec.md` §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub status: RunStatus,
    pub total_steps: u32,
    pub duration_seconds: f64,
    pub total_cost_usd: f64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Ordered sequence of steps taken over one scenario execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRecord {
    pub steps: Vec<StepResult>,
}

impl RunRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: StepResult) {
        self.steps.push(step);
    }

    pub fn total_steps(&self) -> u32 {
        self.steps.len() as u32
    }
}
