use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool advertised by a collaborator service (`spec.md` §3, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub read_only: bool,
}

impl ToolDescriptor {
    /// Derives the read-only flag from the name pattern, unless the
    /// advertising service already hinted at it (`spec.md` §3). A `ui.*`
    /// tool is never read-only, regardless of hint or suffix: it is a UI
    /// action, not a backend probe.
    pub fn derive_read_only(name: &str, explicit_hint: Option<bool>) -> bool {
        if name.starts_with("ui.") {
            return false;
        }
        explicit_hint.unwrap_or_else(|| {
            name.ends_with(".get") || name.ends_with(".list") || name.ends_with(".read")
        })
    }

    pub fn is_ui_action(&self) -> bool {
        self.name.starts_with("ui.")
    }
}
