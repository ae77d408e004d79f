//! Job queue payloads
//!
//! Each stage consumes exactly one payload shape and, on success, enqueues
//! the next stage's payload. Intermediate artifacts travel through these
//! payloads, never through one stage scanning another's files.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::demo::VideoSegment;

/// Enqueued for the planning stage when a demo is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsePayload {
    pub demo_id: Uuid,
}

/// Enqueued when the user confirms the plan or resolves a paused demo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPayload {
    pub demo_id: Uuid,
}

/// Enqueued by the record stage once every step is finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsPayload {
    pub demo_id: Uuid,
    /// All video segments recorded for this demo, in run order.
    pub segments: Vec<VideoSegment>,
}

/// Enqueued by the narration stage with the generated clips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePayload {
    pub demo_id: Uuid,
    pub segments: Vec<VideoSegment>,
    /// Audio clip paths in step order.
    pub audio_clips: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_payload_round_trip() {
        let payload = MergePayload {
            demo_id: Uuid::new_v4(),
            segments: vec![VideoSegment {
                path: "/tmp/demoreel/work/seg_0001.mp4".to_string(),
                duration_seconds: 12.5,
            }],
            audio_clips: vec!["/tmp/demoreel/work/clip_001.mp3".to_string()],
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: MergePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.segments, payload.segments);
        assert_eq!(back.audio_clips, payload.audio_clips);
    }
}
