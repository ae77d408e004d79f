//! Media muxer
//!
//! Stitches the recorded segments (one per record run) into a single video
//! stream, concatenates the narration clips into one track, and muxes both
//! into the final artifact. Intermediates are removed on success.

use std::path::{Path, PathBuf};

use demoreel_core::domain::demo::VideoSegment;
use demoreel_core::error::StageError;
use tracing::info;

use crate::media;

/// Mux `segments` and `clips` into `out_path`.
///
/// Returns the artifact path and its duration rounded to whole seconds.
pub async fn mux(
    segments: &[VideoSegment],
    clips: &[PathBuf],
    out_path: &Path,
    scratch_dir: &Path,
) -> Result<(PathBuf, f64), StageError> {
    if clips.is_empty() {
        return Err(StageError::Mux("no audio clips supplied".to_string()));
    }
    if segments.is_empty() {
        return Err(StageError::Mux("no video segments supplied".to_string()));
    }
    tokio::fs::create_dir_all(scratch_dir).await?;

    let audio_track = scratch_dir.join("narration.mp3");
    media::concat_audio(clips, &audio_track)
        .await
        .map_err(|e| StageError::Mux(e.to_string()))?;

    let segment_paths: Vec<PathBuf> = segments.iter().map(|s| PathBuf::from(&s.path)).collect();
    let (video_track, stitched) = if segment_paths.len() == 1 {
        (segment_paths[0].clone(), false)
    } else {
        let stitched_path = scratch_dir.join("stitched.mp4");
        media::concat_videos(&segment_paths, &stitched_path)
            .await
            .map_err(|e| StageError::Mux(e.to_string()))?;
        (stitched_path, true)
    };

    media::mux_av(&video_track, &audio_track, out_path)
        .await
        .map_err(|e| StageError::Mux(e.to_string()))?;

    let duration = media::probe_duration(out_path)
        .await
        .map_err(|e| StageError::Mux(e.to_string()))?
        .round();

    let _ = tokio::fs::remove_file(&audio_track).await;
    if stitched {
        let _ = tokio::fs::remove_file(&video_track).await;
    }

    info!(
        "muxed {} segments + {} clips into {} ({:.0}s)",
        segments.len(),
        clips.len(),
        out_path.display(),
        duration
    );
    Ok((out_path.to_path_buf(), duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_empty_inputs() {
        let scratch = std::env::temp_dir().join("demoreel-mux-test");
        let out = scratch.join("out.mp4");

        let err = mux(&[], &[PathBuf::from("/tmp/a.mp3")], &out, &scratch)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Mux(_)));

        let segment = VideoSegment {
            path: "/tmp/seg.mp4".to_string(),
            duration_seconds: 3.0,
        };
        let err = mux(std::slice::from_ref(&segment), &[], &out, &scratch)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Mux(_)));
        let _ = tokio::fs::remove_dir_all(&scratch).await;
    }
}
