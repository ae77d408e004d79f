//! Speech-synthesis client
//!
//! OpenAI-style `/audio/speech` endpoint. Every failure surfaces as
//! `SynthesisUnavailable`; the narration stage recovers with a silent clip
//! and the error is never attached to the demo.

use std::path::Path;
use std::time::Duration;

use demoreel_core::error::StageError;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

/// HTTP client for a speech-synthesis backend.
#[derive(Debug, Clone)]
pub struct SpeechClient {
    client: Client,
    api_base: String,
    /// No key configured means the backend is unavailable.
    api_key: Option<String>,
    model: String,
    voice: String,
}

impl SpeechClient {
    pub fn new(api_base: &str, api_key: Option<String>, model: &str, voice: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            voice: voice.to_string(),
        }
    }

    /// Synthesize `text` into an audio file at `out_path`.
    pub async fn synthesize(&self, text: &str, out_path: &Path) -> Result<(), StageError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| StageError::SynthesisUnavailable("no api key configured".to_string()))?;

        let body = json!({
            "model": self.model,
            "voice": self.voice,
            "input": text,
            "response_format": "mp3",
        });

        let response = self
            .client
            .post(format!("{}/audio/speech", self.api_base))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StageError::SynthesisUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::SynthesisUnavailable(format!(
                "backend returned status {}",
                status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StageError::SynthesisUnavailable(e.to_string()))?;
        tokio::fs::write(out_path, &bytes)
            .await
            .map_err(|e| StageError::SynthesisUnavailable(e.to_string()))?;

        debug!("synthesized {} bytes to {}", bytes.len(), out_path.display());
        Ok(())
    }
}
