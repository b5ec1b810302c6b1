use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::sdom::{Sdelta, Sdom};

/// Result of one read-only backend call made by the Probe Broker
/// (`spec.md` §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeResult {
    pub tool: String,
    pub success: bool,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// An immutable record asserting that a specific action succeeded or failed,
/// with cited evidence (`spec.md` §3 "ValidationOutcome").
///
/// `evidence` must refer to concrete values visible in either `sdom` or
/// `probe_results` — callers (the Semantic Validator) are responsible for
/// that invariant; this type only carries the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub id: String,
    pub step: u32,
    pub timestamp: DateTime<Utc>,
    pub passed: bool,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub probe_results: Vec<ProbeResult>,
    pub location: String,
    pub sdom: Sdom,
    #[serde(default)]
    pub sdelta: Option<Sdelta>,
}

impl ValidationOutcome {
    /// Confidence is clamped to `[0, 1]` at construction so every downstream
    /// threshold comparison (`spec.md` §4.8) operates on a valid value.
    pub fn confidence_clamped(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0)
    }

    pub fn any_probe_succeeded(&self) -> bool {
        self.probe_results.iter().any(|probe| probe.success)
    }

    /// True if any concern text matches the UI/backend mismatch pattern the
    /// Critic escalates to a hard failure (`spec.md` §4.8).
    pub fn concerns_mention_mismatch(&self) -> bool {
        self.concerns.iter().any(|concern| {
            let lower = concern.to_lowercase();
            lower.contains("mismatch")
                || lower.contains("does not match")
                || lower.contains("backend shows")
                || lower.contains("backend confirms")
        })
    }
}
