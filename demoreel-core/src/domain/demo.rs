//! Demo domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One end-to-end request to turn a URL into a narrated walkthrough video.
///
/// Owned exclusively by the orchestrator once created; every status change
/// goes through [`DemoStatus::can_transition_to`] before being persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demo {
    pub id: Uuid,
    pub url: String,
    pub description: Option<String>,
    /// Opaque serialized browser storage snapshot captured from an
    /// interactive session (cookies plus per-origin storage).
    pub login_state: Option<serde_json::Value>,
    pub status: DemoStatus,
    /// Short human-readable cause of the last failure, prefixed with the
    /// stage name. Never a stack trace.
    pub error: Option<String>,
    pub artifact_url: Option<String>,
    pub duration_seconds: Option<f64>,
    /// Video segments recorded so far, one per record run. Written only by
    /// the record stage; the muxer stitches them in run order.
    pub segments: Vec<VideoSegment>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// One recording run's video output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoSegment {
    pub path: String,
    pub duration_seconds: f64,
}

/// Demo lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoStatus {
    Pending,
    Parsing,
    Review,
    Recording,
    Processing,
    Completed,
    Paused,
    Failed,
}

impl DemoStatus {
    /// Whether moving from `self` to `next` is a legal edge in the demo
    /// state machine.
    ///
    /// The graph:
    /// `pending -> parsing -> review -> recording -> processing -> completed`
    /// with `paused` recoverable only from `recording`, and `failed`
    /// reachable from `parsing`, `processing` and the post-recording
    /// stages. `completed` and `failed` are absorbing.
    pub fn can_transition_to(self, next: DemoStatus) -> bool {
        use DemoStatus::*;
        matches!(
            (self, next),
            (Pending, Parsing)
                | (Parsing, Review)
                | (Parsing, Failed)
                | (Review, Recording)
                | (Recording, Recording)
                | (Recording, Paused)
                | (Recording, Processing)
                | (Recording, Failed)
                | (Paused, Recording)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, DemoStatus::Completed | DemoStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DemoStatus::*;

    const ALL: [DemoStatus; 8] = [
        Pending, Parsing, Review, Recording, Processing, Completed, Paused, Failed,
    ];

    #[test]
    fn test_happy_path_edges() {
        assert!(Pending.can_transition_to(Parsing));
        assert!(Parsing.can_transition_to(Review));
        assert!(Review.can_transition_to(Recording));
        assert!(Recording.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
    }

    #[test]
    fn test_pause_resume_cycle() {
        assert!(Recording.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Recording));
        // Recording is retained while the record job runs.
        assert!(Recording.can_transition_to(Recording));
    }

    #[test]
    fn test_no_shortcut_jumps() {
        assert!(!Review.can_transition_to(Processing));
        assert!(!Paused.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Review));
        assert!(!Parsing.can_transition_to(Recording));
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        for next in ALL {
            assert!(!Completed.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Paused.is_terminal());
    }

    #[test]
    fn test_paused_only_reachable_from_recording() {
        for from in ALL {
            if from != Recording {
                assert!(!from.can_transition_to(Paused), "{from:?} -> paused");
            }
        }
    }

    #[test]
    fn test_no_return_to_paused_past_recording() {
        assert!(!Processing.can_transition_to(Paused));
        assert!(Processing.can_transition_to(Failed));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&Recording).unwrap();
        assert_eq!(json, "\"recording\"");
        let back: DemoStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(back, Paused);
    }
}
