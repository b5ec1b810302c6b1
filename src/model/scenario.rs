use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A declarative goal, start state, setup steps, and budgets (`spec.md` §3).
///
/// Immutable once loaded. Parsing/validating the scenario *document* on disk
/// is the out-of-scope scenario loader's job; this type is the shape the core
/// consumes once that loader has produced one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub version: String,
    pub id: String,
    pub goal: Goal,
    pub context: ScenarioContext,
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
    pub constraints: Constraints,
}

impl ScenarioSpec {
    /// Checks the invariants `spec.md` §3 calls out: positive constraints and
    /// exactly one of (instruction, mcp) per precondition.
    pub fn validate(&self) -> Result<(), String> {
        // max_steps == 0 is a legal, if degenerate, scenario (see S6); only
        // cost must be strictly positive.
        if self.constraints.max_cost_usd <= 0.0 {
            return Err("constraints.max_cost_usd must be positive".to_string());
        }
        for (idx, precondition) in self.preconditions.iter().enumerate() {
            if !precondition.is_well_formed() {
                return Err(format!(
                    "precondition[{idx}] must carry exactly one of instruction/mcp"
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub description: String,
    pub success: String,
    #[serde(default)]
    pub hints: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioContext {
    pub start_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraints {
    pub max_steps: u32,
    pub max_cost_usd: f64,
    #[serde(default)]
    pub max_wall_seconds: Option<u64>,
}

/// A precondition entry: either a natural-language instruction handed to the
/// Preconditioner, or an explicit tool invocation that bypasses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Precondition {
    Instruction {
        instruction: String,
        #[serde(rename = "as", default)]
        store_as: Option<String>,
    },
    Mcp {
        mcp: String,
        #[serde(default)]
        params: Option<Value>,
        #[serde(default)]
        store_as: Option<String>,
    },
}

impl Precondition {
    pub fn is_well_formed(&self) -> bool {
        // The untagged representation already guarantees exactly one branch
        // parsed; this exists so callers don't need to match on the enum to
        // re-assert the invariant documented in `spec.md` §3.
        matches!(self, Precondition::Instruction { .. } | Precondition::Mcp { .. })
    }

    pub fn store_as(&self) -> Option<&str> {
        match self {
            Precondition::Instruction { store_as, .. } => store_as.as_deref(),
            Precondition::Mcp { store_as, .. } => store_as.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
            preconditions: vec![Precondition::Instruction {
                instruction: "Create a test user".to_string(),
                store_as: Some("user".to_string()),
            }],
            constraints: Constraints {
                max_steps: 10,
                max_cost_usd: 0.5,
                max_wall_seconds: None,
            },
        }
    }

    #[test]
    fn valid_scenario_passes() {
        assert!(base_scenario().validate().is_ok());
    }

    #[test]
    fn non_positive_cost_budget_rejected() {
        let mut scenario = base_scenario();
        scenario.constraints.max_cost_usd = 0.0;
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn precondition_deserializes_from_instruction_shape() {
        let value: Precondition =
            serde_json::from_str(r#"{"instruction":"do thing","as":"x"}"#).unwrap();
        assert_eq!(value.store_as(), Some("x"));
        assert!(matches!(value, Precondition::Instruction { .. }));
    }

    #[test]
    fn precondition_deserializes_from_mcp_shape() {
        let value: Precondition =
            serde_json::from_str(r#"{"mcp":"data.user.create","store_as":"user"}"#).unwrap();
        assert_eq!(value.store_as(), Some("user"));
        assert!(matches!(value, Precondition::Mcp { .. }));
    }
}
