//! Step proposal DTOs

use serde::{Deserialize, Serialize};

use crate::domain::step::ActionKind;

/// A step as proposed by the planner, before it has an identity or a
/// position in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedStep {
    pub title: String,
    pub action: ActionKind,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub narration: Option<String>,
}

impl ProposedStep {
    /// A bare navigation step to `url`, used when the model forgets the
    /// mandatory opening navigate.
    pub fn navigate_to(url: &str) -> Self {
        Self {
            title: "Open the page".to_string(),
            action: ActionKind::Navigate,
            selector: None,
            value: Some(url.to_string()),
            narration: Some("We start by opening the page.".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposed_step_optional_fields_default() {
        let step: ProposedStep =
            serde_json::from_str(r#"{"title": "Wait", "action": "wait", "value": "1500"}"#)
                .unwrap();
        assert_eq!(step.action, ActionKind::Wait);
        assert!(step.selector.is_none());
        assert!(step.narration.is_none());
    }

    #[test]
    fn test_navigate_to_shape() {
        let step = ProposedStep::navigate_to("https://example.com");
        assert_eq!(step.action, ActionKind::Navigate);
        assert_eq!(step.value.as_deref(), Some("https://example.com"));
    }
}
