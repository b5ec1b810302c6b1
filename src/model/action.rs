use serde::{Deserialize, Serialize};

/// Selector for the element an action operates on. Exactly one of the two
/// fields is expected to be set; `test_id` is preferred by the Planner's
/// system prompt (`spec.md` §4.7.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ElementTarget {
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default, rename = "testId")]
    pub test_id: Option<String>,
}

impl ElementTarget {
    pub fn identity(&self) -> Option<&str> {
        self.test_id.as_deref().or(self.selector.as_deref())
    }
}

/// A command the core may issue to the browser service, or a sentinel
/// declaring goal completion/failure (`spec.md` §3, §9).
///
/// Closed set of constructors by design (`spec.md` §9): the dispatcher
/// matches on the tag and never reflects on field names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action")]
pub enum Action {
    #[serde(rename = "navigate")]
    Navigate { url: String },
    #[serde(rename = "click")]
    Click {
        #[serde(flatten)]
        target: ElementTarget,
    },
    #[serde(rename = "type")]
    Type {
        #[serde(flatten)]
        target: ElementTarget,
        text: String,
        #[serde(default)]
        clear: bool,
    },
    #[serde(rename = "interact")]
    Interact {
        #[serde(flatten)]
        target: ElementTarget,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        checked: Option<bool>,
    },
    #[serde(rename = "goal.complete")]
    GoalComplete,
    #[serde(rename = "goal.fail")]
    GoalFail,
}

impl Action {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Action::GoalComplete | Action::GoalFail)
    }

    pub fn is_navigate(&self) -> bool {
        matches!(self, Action::Navigate { .. })
    }

    pub fn target(&self) -> Option<&ElementTarget> {
        match self {
            Action::Click { target } | Action::Type { target, .. } | Action::Interact { target, .. } => {
                Some(target)
            }
            Action::Navigate { .. } | Action::GoalComplete | Action::GoalFail => None,
        }
    }

    /// `(tag, element identity)` used by the stagnation detector to compare
    /// the last three actions (`spec.md` §4.9).
    pub fn stagnation_key(&self) -> Option<(&'static str, String)> {
        if self.is_navigate() || self.is_sentinel() {
            return None;
        }
        let tag = match self {
            Action::Click { .. } => "click",
            Action::Type { .. } => "type",
            Action::Interact { .. } => "interact",
            _ => unreachable!(),
        };
        let identity = self.target()?.identity()?.to_string();
        Some((tag, identity))
    }
}
