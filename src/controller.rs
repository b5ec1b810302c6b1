//! Phase Controller (`spec.md` §4.9): drives stagnation detection and the
//! critic-hint handoff between consecutive Planner calls. The state-machine
//! sequencing itself lives in [`crate::run::Run::run_scenario`], which owns
//! every component this controller coordinates.

use crate::model::Action;

const STAGNATION_WINDOW: usize = 3;

/// Tracks the last three non-sentinel actions and the pending critic hint
/// that must be injected into the next Planner call (`spec.md` §4.9).
#[derive(Debug, Default)]
pub struct PhaseController {
    recent_keys: Vec<(&'static str, String)>,
    pending_hint: Option<String>,
}

impl PhaseController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `action` and returns a stagnation hint if the last three
    /// non-navigate actions now share `(type, test-id/selector)`.
    pub fn record_action(&mut self, action: &Action) -> Option<String> {
        let Some(key) = action.stagnation_key() else {
            self.recent_keys.clear();
            return None;
        };

        self.recent_keys.push(key);
        if self.recent_keys.len() > STAGNATION_WINDOW {
            self.recent_keys.remove(0);
        }

        if self.recent_keys.len() == STAGNATION_WINDOW
            && self.recent_keys.iter().all(|k| *k == self.recent_keys[0])
        {
            let (tag, identity) = &self.recent_keys[0];
            let hint = format!(
                "You have repeated {tag} on '{identity}' three times in a row with no effect. \
                 Do not repeat this action; choose a different element or strategy."
            );
            self.pending_hint = Some(hint.clone());
            Some(hint)
        } else {
            None
        }
    }

    /// Sets an explicit hint (e.g. from a Critic retry decision) to inject
    /// into the next Planner call, overriding any pending stagnation hint.
    pub fn set_hint(&mut self, hint: impl Into<String>) {
        self.pending_hint = Some(hint.into());
    }

    /// Consumes and clears the pending hint, if any.
    pub fn take_hint(&mut self) -> Option<String> {
        self.pending_hint.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementTarget;

    fn click(test_id: &str) -> Action {
        Action::Click {
            target: ElementTarget {
                selector: None,
                test_id: Some(test_id.to_string()),
            },
        }
    }

    #[test]
    fn three_identical_clicks_trigger_stagnation_hint() {
        let mut controller = PhaseController::new();
        assert!(controller.record_action(&click("submit")).is_none());
        assert!(controller.record_action(&click("submit")).is_none());
        assert!(controller.record_action(&click("submit")).is_some());
    }

    #[test]
    fn navigate_resets_the_window() {
        let mut controller = PhaseController::new();
        controller.record_action(&click("submit"));
        controller.record_action(&click("submit"));
        controller.record_action(&Action::Navigate {
            url: "http://localhost/".to_string(),
        });
        assert!(controller.record_action(&click("submit")).is_none());
    }

    #[test]
    fn differing_targets_do_not_trigger() {
        let mut controller = PhaseController::new();
        controller.record_action(&click("a"));
        controller.record_action(&click("b"));
        assert!(controller.record_action(&click("a")).is_none());
    }

    #[test]
    fn hint_round_trips_through_take() {
        let mut controller = PhaseController::new();
        controller.set_hint("address this");
        assert_eq!(controller.take_hint(), Some("address this".to_string()));
        assert_eq!(controller.take_hint(), None);
    }
}
