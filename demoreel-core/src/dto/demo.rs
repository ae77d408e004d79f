//! Demo DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::demo::DemoStatus;

/// Request to create a new demo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDemo {
    pub url: String,
    pub description: Option<String>,
}

/// User resolution of a paused demo's failed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveStep {
    pub position: i32,
    pub action: ResolveAction,
    /// Replacement narration, required for `manual`.
    pub narration: Option<String>,
}

/// What to do with the failed step before re-enqueueing the record run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAction {
    Skip,
    Retry,
    Manual,
}

/// Status notification published on every demo transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoEvent {
    pub demo_id: Uuid,
    pub status: DemoStatus,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_action_wire_shape() {
        let req: ResolveStep =
            serde_json::from_str(r#"{"position": 2, "action": "skip", "narration": null}"#)
                .unwrap();
        assert_eq!(req.position, 2);
        assert_eq!(req.action, ResolveAction::Skip);

        let manual: ResolveStep = serde_json::from_str(
            r#"{"position": 1, "action": "manual", "narration": "Click the login button"}"#,
        )
        .unwrap();
        assert_eq!(manual.action, ResolveAction::Manual);
        assert!(manual.narration.is_some());
    }

    #[test]
    fn test_demo_event_round_trip() {
        let ev = DemoEvent {
            demo_id: Uuid::new_v4(),
            status: DemoStatus::Paused,
            error: Some("record: step 1: navigation failed".to_string()),
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: DemoEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.demo_id, ev.demo_id);
        assert_eq!(back.status, DemoStatus::Paused);
    }
}
