//! Action executor
//!
//! Replays an ordered step list against a fresh browser context while a
//! frame grabber records the viewport. Fatality of a step failure is looked
//! up in the core classification table; the determination happens here, not
//! in the orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use demoreel_browser::{Browser, BrowserConfig, Page, StorageSnapshot};
use demoreel_core::domain::step::{ActionKind, Fatality, Step};
use demoreel_core::error::StageError;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::media;

const RECORD_FPS: u32 = 4;
const FRAME_QUALITY: u8 = 60;
/// Fixed pause after each step to keep the recording legible.
const STEP_PAUSE: Duration = Duration::from_millis(800);
const SELECTOR_WAIT: Duration = Duration::from_secs(5);
const MAX_EXPLICIT_WAIT_MS: u64 = 10_000;

/// What one recording run produced.
#[derive(Debug)]
pub struct RecordingOutcome {
    /// Assembled video segment for this run, absent only when no frames
    /// could be captured.
    pub segment: Option<RecordedSegment>,
    /// Per-step results for every step that was attempted.
    pub results: Vec<StepResult>,
    /// Set when a fatal step aborted the run.
    pub fatal: Option<FatalFailure>,
}

#[derive(Debug)]
pub struct RecordedSegment {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

#[derive(Debug)]
pub struct StepResult {
    pub position: i32,
    pub outcome: StepOutcome,
    /// Seconds into this run's segment.
    pub start_seconds: f64,
    pub end_seconds: f64,
}

#[derive(Debug)]
pub enum StepOutcome {
    Completed,
    /// The step failed but its kind is skippable; the run continued.
    SkippedOnFailure { message: String },
}

#[derive(Debug)]
pub struct FatalFailure {
    pub position: i32,
    pub message: String,
}

/// Executes record runs.
pub struct Executor {
    browser_config: BrowserConfig,
}

impl Executor {
    pub fn new(browser_config: BrowserConfig) -> Self {
        Self { browser_config }
    }

    /// Run `steps` in order against a fresh context seeded with
    /// `login_state`, recording the viewport into `work_dir`.
    pub async fn run(
        &self,
        steps: &[Step],
        login_state: Option<&Value>,
        work_dir: &Path,
    ) -> Result<RecordingOutcome, StageError> {
        tokio::fs::create_dir_all(work_dir).await?;
        let frames_dir = work_dir.join("frames");
        // Stale frames from an earlier run would bleed into this segment.
        let _ = tokio::fs::remove_dir_all(&frames_dir).await;
        tokio::fs::create_dir_all(&frames_dir).await?;

        let browser = Browser::launch(&self.browser_config)
            .await
            .map_err(|e| StageError::Browser(e.to_string()))?;

        let run = self
            .run_steps(&browser, steps, login_state, work_dir, &frames_dir)
            .await;

        browser.close().await;
        run
    }

    async fn run_steps(
        &self,
        browser: &Browser,
        steps: &[Step],
        login_state: Option<&Value>,
        work_dir: &Path,
        frames_dir: &Path,
    ) -> Result<RecordingOutcome, StageError> {
        let page = Arc::new(
            browser
                .new_page()
                .await
                .map_err(|e| StageError::Browser(e.to_string()))?,
        );

        if let Some(state) = login_state {
            if let Some(snapshot) = StorageSnapshot::from_value(state) {
                if let Err(e) = snapshot.restore(&page).await {
                    warn!("login state restore failed: {}", e);
                }
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let grabber = spawn_frame_grabber(Arc::clone(&page), frames_dir.to_path_buf(), stop_rx);
        let run_start = Instant::now();

        let mut results = Vec::new();
        let mut fatal = None;

        for step in steps {
            let start_seconds = run_start.elapsed().as_secs_f64();
            debug!("running step {} ({:?})", step.position, step.action);

            let step_result = execute_step(&page, step).await;

            // Let the page settle so the next step acts on a stable frame.
            let _ = page.wait_for_load().await;
            tokio::time::sleep(STEP_PAUSE).await;
            let end_seconds = run_start.elapsed().as_secs_f64();

            match step_result {
                Ok(()) => {
                    results.push(StepResult {
                        position: step.position,
                        outcome: StepOutcome::Completed,
                        start_seconds,
                        end_seconds,
                    });
                }
                Err(message) => match step.action.fatality() {
                    Fatality::Fatal => {
                        warn!("step {} fatal: {}", step.position, message);
                        capture_diagnostic(&page, work_dir, step.position).await;
                        fatal = Some(FatalFailure {
                            position: step.position,
                            message,
                        });
                        break;
                    }
                    Fatality::Skippable => {
                        info!("step {} failed, skipping: {}", step.position, message);
                        results.push(StepResult {
                            position: step.position,
                            outcome: StepOutcome::SkippedOnFailure { message },
                            start_seconds,
                            end_seconds,
                        });
                    }
                },
            }
        }

        let _ = stop_tx.send(true);
        let frames = grabber.await.unwrap_or(0);

        let segment = if frames > 0 {
            let path = work_dir.join(format!("seg_{}.mp4", unix_millis()));
            match media::assemble_video(frames_dir, RECORD_FPS, &path).await {
                Ok(()) => {
                    let duration_seconds = media::probe_duration(&path).await.unwrap_or(0.0);
                    Some(RecordedSegment {
                        path,
                        duration_seconds,
                    })
                }
                Err(e) => {
                    warn!("segment assembly failed: {}", e);
                    None
                }
            }
        } else {
            None
        };
        let _ = tokio::fs::remove_dir_all(frames_dir).await;

        Ok(RecordingOutcome {
            segment,
            results,
            fatal,
        })
    }
}

/// Execute one step; `Err` carries a human-readable message, classification
/// happens at the caller.
async fn execute_step(page: &Page, step: &Step) -> Result<(), String> {
    match step.action {
        ActionKind::Navigate => {
            let url = step
                .value
                .as_deref()
                .ok_or_else(|| "navigate step has no url".to_string())?;
            page.navigate(url).await.map_err(|e| e.to_string())
        }
        ActionKind::Click => {
            let selector = required_selector(step)?;
            page.wait_for_selector(selector, SELECTOR_WAIT)
                .await
                .map_err(|e| e.to_string())?;
            page.click_selector(selector).await.map_err(|e| e.to_string())
        }
        ActionKind::Fill => {
            let selector = required_selector(step)?;
            let value = step.value.as_deref().unwrap_or("");
            page.wait_for_selector(selector, SELECTOR_WAIT)
                .await
                .map_err(|e| e.to_string())?;
            page.fill_selector(selector, value)
                .await
                .map_err(|e| e.to_string())
        }
        ActionKind::Wait => {
            let ms = step
                .value
                .as_deref()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1000)
                .min(MAX_EXPLICIT_WAIT_MS);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(())
        }
        ActionKind::Assert => {
            let selector = required_selector(step)?;
            page.wait_for_selector(selector, SELECTOR_WAIT)
                .await
                .map_err(|_| format!("assertion failed: no element matches {}", selector))
        }
    }
}

fn required_selector(step: &Step) -> Result<&str, String> {
    step.selector
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("{:?} step has no selector", step.action))
}

/// Screenshots the viewport at a fixed rate into numbered JPEGs. Returns the
/// number of frames captured.
fn spawn_frame_grabber(
    page: Arc<Page>,
    frames_dir: PathBuf,
    mut stop_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<u64> {
    tokio::spawn(async move {
        let mut frame: u64 = 0;
        let mut ticker = tokio::time::interval(Duration::from_millis(1000 / RECORD_FPS as u64));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match page.screenshot_jpeg(FRAME_QUALITY).await {
                        Ok(bytes) => {
                            let path = frames_dir.join(format!("frame_{:06}.jpg", frame));
                            if tokio::fs::write(&path, &bytes).await.is_ok() {
                                frame += 1;
                            }
                        }
                        Err(e) => debug!("frame capture failed: {}", e),
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        frame
    })
}

async fn capture_diagnostic(page: &Page, work_dir: &Path, position: i32) {
    if let Ok(bytes) = page.screenshot_jpeg(80).await {
        let path = work_dir.join(format!("diag_step_{}.jpg", position));
        if tokio::fs::write(&path, &bytes).await.is_ok() {
            info!("diagnostic screenshot saved to {}", path.display());
        }
    }
}

fn unix_millis() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use demoreel_core::domain::step::StepStatus;
    use uuid::Uuid;

    fn step(action: ActionKind, selector: Option<&str>, value: Option<&str>) -> Step {
        Step {
            id: Uuid::new_v4(),
            demo_id: Uuid::new_v4(),
            position: 1,
            title: "t".to_string(),
            action,
            selector: selector.map(str::to_string),
            value: value.map(str::to_string),
            narration: None,
            start_seconds: None,
            end_seconds: None,
            status: StepStatus::Pending,
        }
    }

    #[test]
    fn test_required_selector() {
        assert!(required_selector(&step(ActionKind::Click, Some("#x"), None)).is_ok());
        assert!(required_selector(&step(ActionKind::Click, None, None)).is_err());
        assert!(required_selector(&step(ActionKind::Click, Some(""), None)).is_err());
    }
}
