//! Pipeline job audit records

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit record of one stage execution for a demo.
///
/// Append-only; at most one `running` record per (demo, stage) at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineJob {
    pub id: Uuid,
    pub demo_id: Uuid,
    pub stage: Stage,
    pub status: JobStatus,
    pub error: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Record,
    Tts,
    Merge,
}

impl Stage {
    /// Stage name used in persisted rows and user-visible error prefixes.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::Record => "record",
            Stage::Tts => "tts",
            Stage::Merge => "merge",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status of a pipeline job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Parse.as_str(), "parse");
        assert_eq!(Stage::Record.as_str(), "record");
        assert_eq!(Stage::Tts.as_str(), "tts");
        assert_eq!(Stage::Merge.as_str(), "merge");
        assert_eq!(Stage::Merge.to_string(), "merge");
    }

    #[test]
    fn test_job_status_serde() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Running).unwrap(),
            "\"running\""
        );
    }
}
