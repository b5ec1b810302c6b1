//! UI Actor (`spec.md` §4.5): dispatches a planned Action to the browser
//! collaborator, waits for stabilization, then re-observes.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::{instrument, warn};

use crate::error::McpError;
use crate::mcp::ToolRegistry;
use crate::model::{Action, ElementKind, ElementTarget, Sdom};

/// Fixed post-action stabilization delay (`spec.md` §4.5, §9 open question:
/// not currently scenario-configurable).
pub const UI_STABILIZATION_DELAY: Duration = Duration::from_secs(1);

/// Dispatches planned Actions to the browser collaborator within one
/// Run-scoped browser context (`spec.md` §5).
pub struct UiActor<'a> {
    registry: &'a ToolRegistry,
    context_id: String,
}

#[derive(Debug, Clone)]
pub struct ActDispatchResult {
    pub success: bool,
    pub error: Option<String>,
}

impl<'a> UiActor<'a> {
    pub fn new(registry: &'a ToolRegistry, context_id: impl Into<String>) -> Self {
        Self {
            registry,
            context_id: context_id.into(),
        }
    }

    /// Dispatches `action` to the browser service, sleeps the fixed
    /// stabilization delay, then returns the dispatch outcome. `last_sdom` is
    /// consulted to detect `<select>`-like targets for `type` actions. The
    /// caller is responsible for re-observing afterwards (`spec.md` §4.5).
    #[instrument(skip(self, action, last_sdom), fields(context_id = %self.context_id))]
    pub async fn dispatch(&self, action: &Action, last_sdom: &Sdom) -> ActDispatchResult {
        let call = match self.build_call(action, last_sdom) {
            Ok(call) => call,
            Err(err) => {
                return ActDispatchResult {
                    success: false,
                    error: Some(err.to_string()),
                };
            }
        };

        let result = match self.registry.call(&call.tool, call.arguments).await {
            Ok(_) => ActDispatchResult {
                success: true,
                error: None,
            },
            Err(err) => {
                warn!(error = %err, tool = %call.tool, "browser action failed; continuing loop");
                ActDispatchResult {
                    success: false,
                    error: Some(err.to_string()),
                }
            }
        };

        tokio::time::sleep(UI_STABILIZATION_DELAY).await;
        result
    }

    fn build_call(&self, action: &Action, last_sdom: &Sdom) -> Result<BrowserCall, McpError> {
        let context_id = self.context_id.clone();
        match action {
            Action::Navigate { url } => Ok(BrowserCall {
                tool: "ui.navigate".to_string(),
                arguments: json!({ "url": url, "waitUntil": "load", "contextId": context_id }),
            }),
            Action::Click { target } => Ok(BrowserCall {
                tool: "ui.act.click".to_string(),
                arguments: target_arguments(target, &context_id, None, None),
            }),
            Action::Type { target, text, clear } => {
                if target_is_select(target, last_sdom) {
                    Ok(BrowserCall {
                        tool: "ui.act.interact".to_string(),
                        arguments: target_arguments(target, &context_id, Some(text.clone()), None),
                    })
                } else {
                    Ok(BrowserCall {
                        tool: "ui.act.type".to_string(),
                        arguments: {
                            let mut args = target_arguments(target, &context_id, Some(text.clone()), None);
                            args["clear"] = json!(clear);
                            args
                        },
                    })
                }
            }
            Action::Interact { target, text, checked } => Ok(BrowserCall {
                tool: "ui.act.interact".to_string(),
                arguments: target_arguments(target, &context_id, text.clone(), *checked),
            }),
            Action::GoalComplete | Action::GoalFail => Err(McpError::ToolError(
                "sentinel actions are not dispatched to the browser service".to_string(),
            )),
        }
    }
}

struct BrowserCall {
    tool: String,
    arguments: Value,
}

fn target_arguments(
    target: &ElementTarget,
    context_id: &str,
    text: Option<String>,
    checked: Option<bool>,
) -> Value {
    let mut args = json!({ "contextId": context_id });
    if let Some(test_id) = &target.test_id {
        args["testId"] = json!(test_id);
    } else if let Some(selector) = &target.selector {
        args["selector"] = json!(selector);
    }
    if let Some(text) = text {
        args["text"] = json!(text);
    }
    if let Some(checked) = checked {
        args["checked"] = json!(checked);
    }
    args
}

fn target_is_select(target: &ElementTarget, last_sdom: &Sdom) -> bool {
    let Some(identity) = target.identity() else {
        return false;
    };
    last_sdom
        .interactive
        .iter()
        .any(|element| element.identity() == identity && element.kind == ElementKind::Select)
}
