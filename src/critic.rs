//! Critic (`spec.md` §4.8): deterministic adjudicator over the last
//! `ValidationOutcome` and, in done-declaration mode, over cited evidence.

use crate::evidence::EvidenceStore;
use crate::model::ValidationOutcome;

const PASS_CONFIDENCE_THRESHOLD: f64 = 0.7;
const MISMATCH_HINT_PREFIX: &str = "CRITICAL BUG DETECTED";

#[derive(Debug, Clone, PartialEq)]
pub enum NextActionDecision {
    Continue,
    Retry { hint: String },
    Failure { hint: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DoneDeclarationDecision {
    Success,
    Retry { hint: String },
}

/// Adjudicates the outcome of the most recently validated action
/// (`spec.md` §4.8 "Next-action mode").
pub fn decide_next_action(outcome: &ValidationOutcome) -> NextActionDecision {
    let confidence = outcome.confidence_clamped();

    if confidence < PASS_CONFIDENCE_THRESHOLD {
        return NextActionDecision::Retry {
            hint: retry_hint(outcome),
        };
    }

    if outcome.passed {
        return NextActionDecision::Continue;
    }

    if outcome.any_probe_succeeded() && outcome.concerns_mention_mismatch() {
        return NextActionDecision::Failure {
            hint: format!("{MISMATCH_HINT_PREFIX}: {}", outcome.concerns.join("; ")),
        };
    }

    NextActionDecision::Retry {
        hint: retry_hint(outcome),
    }
}

fn retry_hint(outcome: &ValidationOutcome) -> String {
    if outcome.concerns.is_empty() {
        outcome.reasoning.clone()
    } else {
        format!("{} ({})", outcome.reasoning, outcome.concerns.join("; "))
    }
}

/// Adjudicates a Planner's `goal.complete`-mode `evidence_claims` against the
/// Evidence Store (`spec.md` §4.8 "Done-declaration mode").
pub fn decide_done_declaration(
    evidence_claims: &[String],
    evidence: &EvidenceStore,
    current_step: u32,
) -> DoneDeclarationDecision {
    if evidence_claims.is_empty() {
        return DoneDeclarationDecision::Retry {
            hint: "cite existing outcomes".to_string(),
        };
    }

    for id in evidence_claims {
        let Some(cited) = evidence.lookup(id) else {
            return DoneDeclarationDecision::Retry {
                hint: "cite existing outcomes".to_string(),
            };
        };
        if !cited.passed {
            return DoneDeclarationDecision::Retry {
                hint: format!("cited outcome '{id}' did not pass"),
            };
        }
        if cited.confidence_clamped() < PASS_CONFIDENCE_THRESHOLD {
            return DoneDeclarationDecision::Retry {
                hint: format!("cited outcome '{id}' has low confidence"),
            };
        }
        if evidence.stale(id, current_step) {
            return DoneDeclarationDecision::Retry {
                hint: "Evidence is stale".to_string(),
            };
        }
    }

    let has_recent_high_confidence = evidence
        .recent(5)
        .iter()
        .any(|outcome| outcome.passed && outcome.confidence_clamped() >= PASS_CONFIDENCE_THRESHOLD);

    if evidence.conflicts(evidence_claims, current_step) && !has_recent_high_confidence {
        return DoneDeclarationDecision::Retry {
            hint: "cited evidence conflicts with more recent outcomes".to_string(),
        };
    }

    DoneDeclarationDecision::Success
}
