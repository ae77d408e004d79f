//! Step domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One browser action plus its narration, belonging to a demo's ordered plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub demo_id: Uuid,
    /// 1-based, contiguous and strictly increasing within a demo.
    pub position: i32,
    pub title: String,
    pub action: ActionKind,
    pub selector: Option<String>,
    pub value: Option<String>,
    pub narration: Option<String>,
    /// Seconds into the final video, written once the step has been recorded.
    pub start_seconds: Option<f64>,
    pub end_seconds: Option<f64>,
    pub status: StepStatus,
}

/// The kind of browser action a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    Click,
    Fill,
    Wait,
    Assert,
}

/// How a step failure affects the recording run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fatality {
    /// Halts the run; the demo pauses for human intervention.
    Fatal,
    /// Logged, the run continues with the next step.
    Skippable,
}

impl ActionKind {
    /// Classification table for step failures. New action kinds declare
    /// their own fatality here; callers never match on the kind directly.
    pub fn fatality(self) -> Fatality {
        match self {
            ActionKind::Navigate => Fatality::Fatal,
            ActionKind::Click | ActionKind::Fill | ActionKind::Wait | ActionKind::Assert => {
                Fatality::Skippable
            }
        }
    }
}

/// Per-step execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Recording,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Finished steps never regress except via explicit user intervention
    /// on a `failed` step.
    pub fn is_finished(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }
}

/// Steps a new record run must execute: everything not yet finished, in
/// ascending position order.
pub fn steps_to_run(steps: &[Step]) -> Vec<Step> {
    let mut remaining: Vec<Step> = steps
        .iter()
        .filter(|s| !s.status.is_finished())
        .cloned()
        .collect();
    remaining.sort_by_key(|s| s.position);
    remaining
}

/// Validates that positions form a contiguous run starting at 1.
pub fn positions_are_contiguous(steps: &[Step]) -> bool {
    let mut positions: Vec<i32> = steps.iter().map(|s| s.position).collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(i, &p)| p == (i as i32) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(position: i32, status: StepStatus) -> Step {
        Step {
            id: Uuid::new_v4(),
            demo_id: Uuid::new_v4(),
            position,
            title: format!("Step {position}"),
            action: ActionKind::Click,
            selector: Some("#button".to_string()),
            value: None,
            narration: None,
            start_seconds: None,
            end_seconds: None,
            status,
        }
    }

    #[test]
    fn test_navigate_is_the_only_fatal_kind() {
        assert_eq!(ActionKind::Navigate.fatality(), Fatality::Fatal);
        for kind in [
            ActionKind::Click,
            ActionKind::Fill,
            ActionKind::Wait,
            ActionKind::Assert,
        ] {
            assert_eq!(kind.fatality(), Fatality::Skippable);
        }
    }

    #[test]
    fn test_steps_to_run_filters_finished_and_sorts() {
        let steps = vec![
            step(3, StepStatus::Pending),
            step(1, StepStatus::Completed),
            step(2, StepStatus::Failed),
            step(4, StepStatus::Skipped),
        ];
        let run = steps_to_run(&steps);
        let positions: Vec<i32> = run.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![2, 3]);
    }

    #[test]
    fn test_steps_to_run_empty_when_all_finished() {
        let steps = vec![step(1, StepStatus::Completed), step(2, StepStatus::Skipped)];
        assert!(steps_to_run(&steps).is_empty());
    }

    #[test]
    fn test_positions_contiguous() {
        let good = vec![
            step(2, StepStatus::Pending),
            step(1, StepStatus::Pending),
            step(3, StepStatus::Pending),
        ];
        assert!(positions_are_contiguous(&good));

        let gap = vec![step(1, StepStatus::Pending), step(3, StepStatus::Pending)];
        assert!(!positions_are_contiguous(&gap));

        let zero_based = vec![step(0, StepStatus::Pending), step(1, StepStatus::Pending)];
        assert!(!positions_are_contiguous(&zero_based));

        assert!(positions_are_contiguous(&[]));
    }

    #[test]
    fn test_finished_statuses() {
        assert!(StepStatus::Completed.is_finished());
        assert!(StepStatus::Skipped.is_finished());
        assert!(!StepStatus::Failed.is_finished());
        assert!(!StepStatus::Pending.is_finished());
        assert!(!StepStatus::Recording.is_finished());
    }

    #[test]
    fn test_action_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ActionKind::Navigate).unwrap(),
            "\"navigate\""
        );
        let kind: ActionKind = serde_json::from_str("\"fill\"").unwrap();
        assert_eq!(kind, ActionKind::Fill);
    }
}
