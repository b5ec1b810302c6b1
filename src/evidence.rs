//! Evidence Store (`spec.md` §4.2): append-only, run-scoped repository of
//! `ValidationOutcome`s used to justify termination.

use std::collections::HashMap;

use crate::model::ValidationOutcome;

/// Staleness window in steps (`spec.md` §4.2, §8 invariant 5).
pub const STALE_AFTER_STEPS: u32 = 5;

#[derive(Debug, Default)]
pub struct EvidenceStore {
    order: Vec<String>,
    by_id: HashMap<String, ValidationOutcome>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `outcome` by id. Duplicate ids are a fatal invariant
    /// violation, surfaced to the caller rather than silently overwritten.
    pub fn append(&mut self, outcome: ValidationOutcome) -> Result<(), String> {
        if self.by_id.contains_key(&outcome.id) {
            return Err(format!(
                "evidence store invariant violated: duplicate outcome id '{}'",
                outcome.id
            ));
        }
        self.order.push(outcome.id.clone());
        self.by_id.insert(outcome.id.clone(), outcome);
        Ok(())
    }

    /// Last `n` outcomes, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&ValidationOutcome> {
        self.order
            .iter()
            .rev()
            .take(n)
            .rev()
            .filter_map(|id| self.by_id.get(id))
            .collect()
    }

    /// Every outcome recorded so far, oldest first. Used where a caller must
    /// weigh the full history rather than a fixed recent window
    /// (`spec.md` §4.7.5: the Goal Checker sees "all validation outcomes so
    /// far").
    pub fn all(&self) -> Vec<&ValidationOutcome> {
        self.recent(self.order.len())
    }

    pub fn lookup(&self, id: &str) -> Option<&ValidationOutcome> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// True iff `current_step - outcome.step > 5` (`spec.md` §4.2).
    pub fn stale(&self, id: &str, current_step: u32) -> bool {
        match self.lookup(id) {
            Some(outcome) => current_step.saturating_sub(outcome.step) > STALE_AFTER_STEPS,
            None => true,
        }
    }

    /// True iff any cited outcome is missing, failed, or stale, or any
    /// outcome newer than the latest cited one is a non-pass
    /// (`spec.md` §4.2).
    pub fn conflicts(&self, ids: &[String], current_step: u32) -> bool {
        let mut latest_cited_step = None;

        for id in ids {
            match self.lookup(id) {
                None => return true,
                Some(outcome) => {
                    if !outcome.passed || self.stale(id, current_step) {
                        return true;
                    }
                    latest_cited_step = Some(latest_cited_step.unwrap_or(0).max(outcome.step));
                }
            }
        }

        let Some(latest_cited_step) = latest_cited_step else {
            return true;
        };

        self.order.iter().filter_map(|id| self.by_id.get(id)).any(|outcome| {
            outcome.step > latest_cited_step && !outcome.passed
        })
    }
}
