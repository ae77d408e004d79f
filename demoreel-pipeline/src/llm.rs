//! Chat-completion client
//!
//! Thin OpenAI-compatible client used by the planner. Retry policy lives in
//! the orchestrator's job layer, not here.

use std::time::Duration;

use demoreel_core::error::StageError;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

/// HTTP client for an OpenAI-style `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// One-shot completion. Returns the assistant message content; an empty
    /// response is a planning failure.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, StageError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.2,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StageError::Planning(format!("model request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StageError::Planning(format!(
                "model returned status {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| StageError::Planning(format!("bad model response: {}", e)))?;

        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(StageError::Planning("model returned empty content".to_string()));
        }

        debug!("model returned {} chars", content.len());
        Ok(content)
    }
}
