use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Category of an interactive SDOM element (`spec.md` §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Button,
    Input,
    Select,
    Link,
    Checkbox,
    Radio,
}

/// One interactive element in the semantic projection of a page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractiveElement {
    pub kind: ElementKind,
    pub label: String,
    #[serde(default, rename = "testId")]
    pub test_id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub required: bool,
}

impl InteractiveElement {
    /// Element identity for diffing: test-id when present, else the label,
    /// else truncated text (`spec.md` §3).
    pub fn identity(&self) -> String {
        self.test_id
            .clone()
            .unwrap_or_else(|| truncate(&self.label, 80))
    }
}

/// A heading, label, or paragraph of static content on the page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentElement {
    Heading { level: u8, text: String },
    Label { text: String },
    Paragraph { text: String },
}

impl ContentElement {
    pub fn text(&self) -> &str {
        match self {
            ContentElement::Heading { text, .. } => text,
            ContentElement::Label { text } => text,
            ContentElement::Paragraph { text } => text,
        }
    }

    fn identity(&self) -> String {
        truncate(self.text(), 80)
    }
}

/// Classification of a feedback banner/toast on the page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Info,
    Warning,
    Error,
    Success,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackMessage {
    pub kind: FeedbackKind,
    pub text: String,
    #[serde(default)]
    pub field: Option<String>,
}

impl FeedbackMessage {
    fn identity(&self) -> String {
        truncate(&self.text, 80)
    }
}

/// Semantic projection of a live page into three ordered sequences
/// (`spec.md` §3 "SDOM").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Sdom {
    #[serde(default)]
    pub interactive: Vec<InteractiveElement>,
    #[serde(default)]
    pub content: Vec<ContentElement>,
    #[serde(default)]
    pub feedback: Vec<FeedbackMessage>,
}

impl Sdom {
    /// Test-ids visible anywhere in this SDOM, consulted by the Policy
    /// Guard's element-existence check (`spec.md` §4.4).
    pub fn test_ids(&self) -> impl Iterator<Item = &str> {
        self.interactive
            .iter()
            .filter_map(|element| element.test_id.as_deref())
    }

    /// True when the page is a pure form-input page: every interactive
    /// element is an empty input/select and at least one heading reads like
    /// a search/filter prompt. Consulted by the Probe Planner's "never probe
    /// on pure form-input pages" rule (`spec.md` §4.7.3).
    pub fn looks_like_pure_form_input(&self) -> bool {
        let has_data = self.interactive.iter().any(|element| {
            !matches!(element.kind, ElementKind::Input | ElementKind::Select)
                || element.value.as_deref().is_some_and(|v| !v.is_empty())
        });
        !has_data && !self.interactive.is_empty()
    }

    fn identities(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        ids.extend(self.interactive.iter().map(InteractiveElement::identity));
        ids.extend(self.content.iter().map(ContentElement::identity));
        ids.extend(self.feedback.iter().map(FeedbackMessage::identity));
        ids
    }

    fn interactive_by_identity(&self) -> std::collections::HashMap<String, &InteractiveElement> {
        self.interactive
            .iter()
            .map(|element| (element.identity(), element))
            .collect()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// A field's value before/after a diffed change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangedElement {
    pub identity: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrlTransition {
    pub from: String,
    pub to: String,
}

/// Structural diff between two consecutive [`Sdom`]s in the same run
/// (`spec.md` §3 "SDELTA").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Sdelta {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub changed: Vec<ChangedElement>,
    #[serde(default)]
    pub url_transition: Option<UrlTransition>,
}

impl Sdelta {
    /// Diffs `next` against `previous`, per the element-identity rule in
    /// `spec.md` §3.
    pub fn diff(previous: &Sdom, previous_location: &str, next: &Sdom, next_location: &str) -> Self {
        let before = previous.identities();
        let after = next.identities();

        let added = after.difference(&before).cloned().collect();
        let removed = before.difference(&after).cloned().collect();

        let before_interactive = previous.interactive_by_identity();
        let after_interactive = next.interactive_by_identity();

        let mut changed = Vec::new();
        for (identity, after_element) in &after_interactive {
            if let Some(before_element) = before_interactive.get(identity) {
                if before_element.value != after_element.value {
                    changed.push(ChangedElement {
                        identity: identity.clone(),
                        old_value: before_element.value.clone(),
                        new_value: after_element.value.clone(),
                    });
                }
            }
        }
        changed.sort_by(|a, b| a.identity.cmp(&b.identity));

        let url_transition = if previous_location != next_location {
            Some(UrlTransition {
                from: previous_location.to_string(),
                to: next_location.to_string(),
            })
        } else {
            None
        };

        Self {
            added,
            removed,
            changed,
            url_transition,
        }
    }
}

/// One snapshot of the live page (`spec.md` §3 "Observation").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub location: String,
    pub page_title: String,
    pub sdom: Sdom,
    #[serde(default)]
    pub sdelta: Option<Sdelta>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(test_id: &str, value: &str) -> InteractiveElement {
        InteractiveElement {
            kind: ElementKind::Input,
            label: test_id.to_string(),
            test_id: Some(test_id.to_string()),
            value: Some(value.to_string()),
            disabled: false,
            required: false,
        }
    }

    #[test]
    fn identity_prefers_test_id() {
        let element = input("email", "a@b.com");
        assert_eq!(element.identity(), "email");
    }

    #[test]
    fn identity_falls_back_to_truncated_label() {
        let element = InteractiveElement {
            kind: ElementKind::Button,
            label: "Submit".to_string(),
            test_id: None,
            value: None,
            disabled: false,
            required: false,
        };
        assert_eq!(element.identity(), "Submit");
    }

    #[test]
    fn diff_detects_added_removed_and_changed() {
        let before = Sdom {
            interactive: vec![input("email", "")],
            content: vec![],
            feedback: vec![],
        };
        let after = Sdom {
            interactive: vec![input("email", "a@b.com")],
            content: vec![ContentElement::Heading {
                level: 1,
                text: "Dashboard".to_string(),
            }],
            feedback: vec![],
        };

        let delta = Sdelta::diff(&before, "/login", &after, "/dashboard");
        assert_eq!(delta.added, vec!["Dashboard".to_string()]);
        assert!(delta.removed.is_empty());
        assert_eq!(delta.changed.len(), 1);
        assert_eq!(delta.changed[0].identity, "email");
        assert_eq!(delta.changed[0].old_value, Some(String::new()));
        assert_eq!(delta.changed[0].new_value, Some("a@b.com".to_string()));
        assert_eq!(
            delta.url_transition,
            Some(UrlTransition {
                from: "/login".to_string(),
                to: "/dashboard".to_string(),
            })
        );
    }

    #[test]
    fn pure_form_input_page_detected() {
        let sdom = Sdom {
            interactive: vec![input("search", "")],
            content: vec![ContentElement::Heading {
                level: 1,
                text: "Search loans".to_string(),
            }],
            feedback: vec![],
        };
        assert!(sdom.looks_like_pure_form_input());
    }
}
