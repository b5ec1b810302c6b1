//! Context Assembler (`spec.md` §4.3): a pure projection from
//! [`SharedMemory`] and the Evidence Store into typed, agent-specific views.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::evidence::EvidenceStore;
use crate::model::{SharedMemory, ValidationOutcome};

const CREDENTIAL_FIELDS: &[&str] = &["email", "password", "token", "otpSecret"];
const ID_FIELD_SUFFIXES: &[&str] = &["userId", "id"];

fn flatten_field(memory: &SharedMemory, field: &str) -> BTreeMap<String, Value> {
    let mut flattened = BTreeMap::new();
    for (key, record) in memory.public_entries() {
        if let Some(value) = record.get(field) {
            flattened.insert(format!("{key}.{field}"), value.clone());
        }
    }
    flattened
}

/// Credential fields (`k.email`, `k.password`, `k.token`, `k.otpSecret`)
/// flattened from every public record in `SharedMemory`.
pub fn credentials(memory: &SharedMemory) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for field in CREDENTIAL_FIELDS {
        out.extend(flatten_field(memory, field));
    }
    out
}

/// Id-like fields (`k.userId`, `k.id`, ...) flattened from every public
/// record.
pub fn ids(memory: &SharedMemory) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for field in ID_FIELD_SUFFIXES {
        out.extend(flatten_field(memory, field));
    }
    out
}

/// Boolean-valued fields flattened as `k.field`.
pub fn flags(memory: &SharedMemory) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for (key, record) in memory.public_entries() {
        for (field, value) in record {
            if value.is_boolean() {
                out.insert(format!("{key}.{field}"), value.clone());
            }
        }
    }
    out
}

/// Summary of a `ValidationOutcome` for agent context, excluding the full
/// SDOM/SDELTA snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    pub id: String,
    pub step: u32,
    pub passed: bool,
    pub confidence: f64,
    pub reasoning: String,
    pub evidence: Vec<String>,
}

impl From<&ValidationOutcome> for OutcomeSummary {
    fn from(outcome: &ValidationOutcome) -> Self {
        Self {
            id: outcome.id.clone(),
            step: outcome.step,
            passed: outcome.passed,
            confidence: outcome.confidence,
            reasoning: outcome.reasoning.clone(),
            evidence: outcome.evidence.clone(),
        }
    }
}

/// Everything the Planner agent may see. Deliberately excludes the raw
/// `ValidationOutcome.probeResults` payloads — the Planner reasons over
/// summaries, not full probe bodies.
#[derive(Debug, Clone, Serialize)]
pub struct PlannerContext {
    pub credentials: BTreeMap<String, Value>,
    pub ids: BTreeMap<String, Value>,
    pub flags: BTreeMap<String, Value>,
    pub recent_outcomes: Vec<OutcomeSummary>,
}

/// Everything the Semantic Validator may see. Excludes `credentials` so raw
/// secrets (passwords, tokens) never reach validator reasoning
/// (`spec.md` §4.3).
#[derive(Debug, Clone, Serialize)]
pub struct ValidatorContext {
    pub ids: BTreeMap<String, Value>,
    pub flags: BTreeMap<String, Value>,
}

/// Everything the Goal Checker / Critic may see: outcome summaries only, no
/// raw memory fields. Unlike `PlannerContext`, this carries every outcome so
/// far rather than a 5-capped window — the Goal Checker must weigh the full
/// history, most recent weighted most heavily, not lose outcomes past step 5
/// (`spec.md` §4.7.5).
#[derive(Debug, Clone, Serialize)]
pub struct CriticContext {
    pub recent_outcomes: Vec<OutcomeSummary>,
}

/// Projects `memory` and `evidence` into the three typed views.
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn planner_view(memory: &SharedMemory, evidence: &EvidenceStore) -> PlannerContext {
        PlannerContext {
            credentials: credentials(memory),
            ids: ids(memory),
            flags: flags(memory),
            recent_outcomes: evidence.recent(5).iter().map(OutcomeSummary::from).collect(),
        }
    }

    pub fn validator_view(memory: &SharedMemory) -> ValidatorContext {
        ValidatorContext {
            ids: ids(memory),
            flags: flags(memory),
        }
    }

    pub fn critic_view(evidence: &EvidenceStore) -> CriticContext {
        CriticContext {
            recent_outcomes: evidence.all().iter().map(OutcomeSummary::from).collect(),
        }
    }
}
