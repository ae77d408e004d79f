//! ffmpeg/ffprobe helpers
//!
//! All media encoding runs through ffmpeg child processes. Helpers return
//! `StageError::MediaIo` with the tail of stderr on failure.

use std::path::{Path, PathBuf};

use demoreel_core::error::StageError;
use tokio::process::Command;
use tracing::debug;

/// Run ffmpeg with `-y` plus the given args.
pub async fn run_ffmpeg(args: &[&str]) -> Result<(), StageError> {
    let output = Command::new("ffmpeg")
        .arg("-y")
        .args(args)
        .output()
        .await
        .map_err(|e| StageError::MediaIo(format!("failed to spawn ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(5)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("; ");
        return Err(StageError::MediaIo(format!("ffmpeg failed: {}", tail)));
    }
    Ok(())
}

/// Measure a media file's real duration in seconds with ffprobe.
pub async fn probe_duration(path: &Path) -> Result<f64, StageError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| StageError::MediaIo(format!("failed to spawn ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(StageError::MediaIo(format!(
            "ffprobe failed for {}",
            path.display()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    text.trim()
        .parse::<f64>()
        .map_err(|_| StageError::MediaIo(format!("unparsable duration: {}", text.trim())))
}

/// Generate a silent mp3 clip of the given length.
pub async fn silence_clip(seconds: f64, out_path: &Path) -> Result<(), StageError> {
    let duration = format!("{:.2}", seconds);
    run_ffmpeg(&[
        "-f",
        "lavfi",
        "-i",
        "anullsrc=r=24000:cl=mono",
        "-t",
        &duration,
        "-q:a",
        "9",
        &out_path.to_string_lossy(),
    ])
    .await
}

/// Assemble numbered JPEG frames into an H.264 video segment.
pub async fn assemble_video(
    frames_dir: &Path,
    fps: u32,
    out_path: &Path,
) -> Result<(), StageError> {
    let pattern = frames_dir.join("frame_%06d.jpg");
    let framerate = fps.to_string();
    run_ffmpeg(&[
        "-framerate",
        &framerate,
        "-i",
        &pattern.to_string_lossy(),
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        &out_path.to_string_lossy(),
    ])
    .await
}

/// Concatenate audio clips into one mp3 track, re-encoding so clips of mixed
/// provenance (synthesized and silent) join cleanly.
pub async fn concat_audio(clips: &[PathBuf], out_path: &Path) -> Result<(), StageError> {
    let list_path = out_path.with_extension("txt");
    write_concat_list(&list_path, clips).await?;
    let result = run_ffmpeg(&[
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
        &list_path.to_string_lossy(),
        "-acodec",
        "libmp3lame",
        &out_path.to_string_lossy(),
    ])
    .await;
    let _ = tokio::fs::remove_file(&list_path).await;
    result
}

/// Concatenate video segments recorded across runs, re-encoding to keep
/// timestamps monotonic.
pub async fn concat_videos(segments: &[PathBuf], out_path: &Path) -> Result<(), StageError> {
    let list_path = out_path.with_extension("txt");
    write_concat_list(&list_path, segments).await?;
    let result = run_ffmpeg(&[
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
        &list_path.to_string_lossy(),
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-an",
        &out_path.to_string_lossy(),
    ])
    .await;
    let _ = tokio::fs::remove_file(&list_path).await;
    result
}

/// Mux one video stream against one audio track, truncating to the shorter,
/// encoded for broadly compatible streaming playback.
pub async fn mux_av(video: &Path, audio: &Path, out_path: &Path) -> Result<(), StageError> {
    run_ffmpeg(&[
        "-i",
        &video.to_string_lossy(),
        "-i",
        &audio.to_string_lossy(),
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-c:a",
        "aac",
        "-shortest",
        "-movflags",
        "+faststart",
        &out_path.to_string_lossy(),
    ])
    .await
}

async fn write_concat_list(list_path: &Path, files: &[PathBuf]) -> Result<(), StageError> {
    let mut body = String::new();
    for file in files {
        // Concat demuxer quoting: single quotes around the path.
        body.push_str(&format!("file '{}'\n", file.to_string_lossy()));
    }
    debug!("writing concat list with {} entries", files.len());
    tokio::fs::write(list_path, body).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_concat_list_format() {
        let dir = std::env::temp_dir().join("demoreel-test-concat");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let list = dir.join("list.txt");
        write_concat_list(
            &list,
            &[PathBuf::from("/tmp/a.mp3"), PathBuf::from("/tmp/b.mp3")],
        )
        .await
        .unwrap();
        let body = tokio::fs::read_to_string(&list).await.unwrap();
        assert_eq!(body, "file '/tmp/a.mp3'\nfile '/tmp/b.mp3'\n");
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
