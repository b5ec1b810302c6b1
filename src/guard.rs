//! Policy Guard (`spec.md` §4.4): deterministic pre-flight gate applied to
//! every non-sentinel Action, checks short-circuiting in order.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use reqwest::Url;

use crate::error::GuardError;
use crate::model::{Action, Budgets, Sdom};

const MAX_ACTIONS_PER_SECOND: usize = 3;
const RATE_WINDOW: Duration = Duration::from_secs(1);
const MIN_WILDCARD_SELECTOR_LEN: usize = 10;

fn default_dangerous_patterns() -> Vec<&'static str> {
    vec!["delete", "destroy", "[class*=danger]"]
}

/// Tracks the sliding one-second action window and the allowed-hosts set
/// across a Run's lifetime; stateless checks live as free functions.
pub struct PolicyGuard {
    allowed_hosts: HashSet<String>,
    dangerous_patterns: Vec<String>,
    recent_action_times: VecDeque<Instant>,
}

impl Default for PolicyGuard {
    fn default() -> Self {
        Self::new(
            ["localhost", "127.0.0.1"].iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl PolicyGuard {
    pub fn new(allowed_hosts: HashSet<String>) -> Self {
        Self {
            allowed_hosts,
            dangerous_patterns: default_dangerous_patterns()
                .into_iter()
                .map(str::to_string)
                .collect(),
            recent_action_times: VecDeque::new(),
        }
    }

    /// Runs the full ordered check for `action` against `budgets`, the step
    /// index about to be taken, and the last observed `sdom`. Returns the
    /// first failing check, short-circuiting per `spec.md` §4.4.
    pub fn check(&mut self, action: &Action, budgets: &Budgets, last_sdom: &Sdom) -> Result<(), GuardError> {
        self.check_budgets(budgets)?;
        self.check_rate_limit()?;

        if let Action::Navigate { url } = action {
            check_navigation_target(url, &self.allowed_hosts)?;
        }

        check_element_existence(action, last_sdom)?;
        check_selector_hygiene(action, &self.dangerous_patterns)?;

        self.recent_action_times.push_back(Instant::now());
        Ok(())
    }

    fn check_budgets(&self, budgets: &Budgets) -> Result<(), GuardError> {
        if budgets.step_budget_exhausted() {
            return Err(GuardError::StepBudgetExhausted {
                used: budgets.steps_used,
                max: budgets.steps_max,
            });
        }
        if budgets.cost_budget_exhausted() {
            return Err(GuardError::CostBudgetExhausted {
                used: budgets.cost_used,
                max: budgets.cost_max,
            });
        }
        if budgets.wall_clock_exhausted() {
            return Err(GuardError::WallClockExhausted {
                elapsed: budgets.elapsed_seconds(),
                max: budgets.max_wall_seconds.unwrap_or(0),
            });
        }
        Ok(())
    }

    fn check_rate_limit(&mut self) -> Result<(), GuardError> {
        let now = Instant::now();
        while let Some(&oldest) = self.recent_action_times.front() {
            if now.duration_since(oldest) > RATE_WINDOW {
                self.recent_action_times.pop_front();
            } else {
                break;
            }
        }
        if self.recent_action_times.len() >= MAX_ACTIONS_PER_SECOND {
            return Err(GuardError::RateLimited);
        }
        Ok(())
    }
}

fn check_navigation_target(url: &str, allowed_hosts: &HashSet<String>) -> Result<(), GuardError> {
    let parsed = Url::parse(url).map_err(|_| GuardError::UnparseableUrl(url.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| GuardError::UnparseableUrl(url.to_string()))?;
    if !allowed_hosts.contains(host) {
        return Err(GuardError::DisallowedHost(host.to_string()));
    }
    Ok(())
}

fn check_element_existence(action: &Action, last_sdom: &Sdom) -> Result<(), GuardError> {
    let Some(target) = action.target() else {
        return Ok(());
    };
    let Some(test_id) = target.test_id.as_deref() else {
        return Ok(());
    };
    if last_sdom.test_ids().any(|id| id == test_id) {
        Ok(())
    } else {
        Err(GuardError::UnknownElement(test_id.to_string()))
    }
}

fn check_selector_hygiene(action: &Action, dangerous_patterns: &[String]) -> Result<(), GuardError> {
    let Some(target) = action.target() else {
        return Ok(());
    };
    let Some(selector) = target.selector.as_deref() else {
        return Ok(());
    };

    let lower = selector.to_lowercase();
    for pattern in dangerous_patterns {
        if lower.contains(&pattern.to_lowercase()) {
            return Err(GuardError::DangerousSelector(selector.to_string()));
        }
    }

    if selector.contains('*') && selector.len() < MIN_WILDCARD_SELECTOR_LEN {
        return Err(GuardError::BroadWildcard(selector.to_string()));
    }

    Ok(())
}
