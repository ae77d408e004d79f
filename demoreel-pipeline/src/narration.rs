//! Narration synthesizer
//!
//! One audio clip per step, in step order. When the synthesis backend is
//! unavailable the clip is silence sized by an estimate, but the durations
//! reported downstream are always re-measured from the files themselves.

use std::path::{Path, PathBuf};

use demoreel_core::domain::step::Step;
use demoreel_core::error::StageError;
use tracing::{debug, info};

use crate::media;
use crate::tts::SpeechClient;

/// Reading rate used to size silent fallback clips.
const WORDS_PER_SECOND: f64 = 2.5;
const MIN_CLIP_SECONDS: f64 = 2.0;

/// Ordered clips plus measured durations.
#[derive(Debug)]
pub struct NarrationOutcome {
    pub clips: Vec<PathBuf>,
    pub durations: Vec<f64>,
    pub total_seconds: f64,
}

/// Turns step narration into audio clips.
pub struct Synthesizer {
    speech: SpeechClient,
}

impl Synthesizer {
    pub fn new(speech: SpeechClient) -> Self {
        Self { speech }
    }

    /// Generate one clip per step into `work_dir`.
    pub async fn synthesize(
        &self,
        steps: &[Step],
        work_dir: &Path,
    ) -> Result<NarrationOutcome, StageError> {
        tokio::fs::create_dir_all(work_dir).await?;

        let mut clips = Vec::with_capacity(steps.len());
        let mut durations = Vec::with_capacity(steps.len());

        for step in steps {
            let text = narration_text(step);
            let clip = work_dir.join(format!("clip_{:03}.mp3", step.position));

            match self.speech.synthesize(&text, &clip).await {
                Ok(()) => debug!("synthesized narration for step {}", step.position),
                Err(StageError::SynthesisUnavailable(reason)) => {
                    debug!(
                        "synthesis unavailable for step {} ({}), using silence",
                        step.position, reason
                    );
                    let seconds = estimate_silence_seconds(&text);
                    media::silence_clip(seconds, &clip).await?;
                }
                Err(e) => return Err(e),
            }

            // Trust the file, not the estimate, so downstream timestamps
            // reflect reality.
            let duration = media::probe_duration(&clip).await?;
            clips.push(clip);
            durations.push(duration);
        }

        let total_seconds = durations.iter().sum();
        info!(
            "narration ready: {} clips, {:.1}s total",
            clips.len(),
            total_seconds
        );
        Ok(NarrationOutcome {
            clips,
            durations,
            total_seconds,
        })
    }
}

/// Narration text for a step, falling back to its title.
pub fn narration_text(step: &Step) -> String {
    step.narration
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(&step.title)
        .to_string()
}

/// Silent-clip length from word count at a fixed reading rate, floored at
/// two seconds.
pub fn estimate_silence_seconds(text: &str) -> f64 {
    let words = text.split_whitespace().count();
    (words as f64 / WORDS_PER_SECOND).max(MIN_CLIP_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use demoreel_core::domain::step::{ActionKind, StepStatus};
    use uuid::Uuid;

    fn step(narration: Option<&str>, title: &str) -> Step {
        Step {
            id: Uuid::new_v4(),
            demo_id: Uuid::new_v4(),
            position: 1,
            title: title.to_string(),
            action: ActionKind::Click,
            selector: None,
            value: None,
            narration: narration.map(str::to_string),
            start_seconds: None,
            end_seconds: None,
            status: StepStatus::Pending,
        }
    }

    #[test]
    fn test_narration_text_falls_back_to_title() {
        assert_eq!(
            narration_text(&step(Some("We click the button."), "Click")),
            "We click the button."
        );
        assert_eq!(narration_text(&step(None, "Click the button")), "Click the button");
        assert_eq!(narration_text(&step(Some("   "), "Click")), "Click");
    }

    #[test]
    fn test_estimate_uses_word_rate() {
        // 10 words at 2.5 wps = 4 seconds.
        let text = "one two three four five six seven eight nine ten";
        assert!((estimate_silence_seconds(text) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_floors_at_two_seconds() {
        assert_eq!(estimate_silence_seconds("hi"), 2.0);
        assert_eq!(estimate_silence_seconds(""), 2.0);
    }
}
