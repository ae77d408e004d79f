//! Attached page session
//!
//! Wraps one target/session pair. Waits poll page state through
//! `Runtime.evaluate` rather than subscribing to protocol events.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use serde_json::{Value, json};
use tracing::debug;

use crate::client::CdpClient;
use crate::error::BrowserError;

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One live page in a browser.
pub struct Page {
    target_id: String,
    session_id: String,
    client: Arc<CdpClient>,
}

impl Page {
    pub(crate) fn new(target_id: String, session_id: String, client: Arc<CdpClient>) -> Self {
        Self {
            target_id,
            session_id,
            client,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Send a command scoped to this page's session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, BrowserError> {
        self.client
            .call(method, params, Some(&self.session_id))
            .await
    }

    pub(crate) async fn enable_domains(&self) -> Result<(), BrowserError> {
        self.call("Page.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;
        debug!("enabled cdp domains for session {}", self.session_id);
        Ok(())
    }

    /// Fix the logical viewport so relayed coordinates are stable no matter
    /// how the client renders the screenshot.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<(), BrowserError> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            Some(json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            })),
        )
        .await?;
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Navigate and wait for the page to load.
    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText").and_then(|e| e.as_str()) {
            if !error.is_empty() {
                return Err(BrowserError::NavigationFailed(error.to_string()));
            }
        }

        self.wait_for_load().await?;
        debug!("navigated to {}", url);
        Ok(())
    }

    /// Poll document.readyState until the page has settled.
    pub async fn wait_for_load(&self) -> Result<(), BrowserError> {
        let start = std::time::Instant::now();
        loop {
            let result = self.evaluate("document.readyState").await?;
            if let Some(state) = result.as_str() {
                if state == "complete" || state == "interactive" {
                    return Ok(());
                }
            }
            if start.elapsed() > LOAD_TIMEOUT {
                return Err(BrowserError::Timeout("page load timeout".to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn current_url(&self) -> Result<String, BrowserError> {
        let result = self.evaluate("window.location.href").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    // ========================================================================
    // JavaScript
    // ========================================================================

    /// Evaluate an expression and return its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("unknown error");
            return Err(BrowserError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Poll until `selector` matches an element.
    pub async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let expr = format!(
            "!!document.querySelector({})",
            serde_json::to_string(selector)?
        );
        let start = std::time::Instant::now();
        loop {
            if self.evaluate(&expr).await?.as_bool() == Some(true) {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(BrowserError::ElementNotFound(selector.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Scroll the element into view and click its center with a real mouse
    /// event, so the recording shows the interaction.
    pub async fn click_selector(&self, selector: &str) -> Result<(), BrowserError> {
        let sel = serde_json::to_string(selector)?;
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return null; \
             el.scrollIntoView({{block: 'center'}}); const r = el.getBoundingClientRect(); \
             return {{x: r.x + r.width / 2, y: r.y + r.height / 2}}; }})()"
        );
        let center = self.evaluate(&expr).await?;
        let (x, y) = match (center["x"].as_f64(), center["y"].as_f64()) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(BrowserError::ElementNotFound(selector.to_string())),
        };
        self.click(x, y).await
    }

    /// Set an input's value and fire the framework-visible events.
    pub async fn fill_selector(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let sel = serde_json::to_string(selector)?;
        let val = serde_json::to_string(value)?;
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
             el.focus(); el.value = {val}; \
             el.dispatchEvent(new Event('input', {{bubbles: true}})); \
             el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()"
        );
        if self.evaluate(&expr).await?.as_bool() != Some(true) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Input dispatch
    // ========================================================================

    /// Click at viewport coordinates.
    pub async fn click(&self, x: f64, y: f64) -> Result<(), BrowserError> {
        for event_type in ["mousePressed", "mouseReleased"] {
            self.call(
                "Input.dispatchMouseEvent",
                Some(json!({
                    "type": event_type,
                    "x": x,
                    "y": y,
                    "button": "left",
                    "clickCount": 1,
                })),
            )
            .await?;
        }
        Ok(())
    }

    /// Scroll with the wheel at viewport coordinates.
    pub async fn scroll(&self, x: f64, y: f64, delta_y: f64) -> Result<(), BrowserError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": "mouseWheel",
                "x": x,
                "y": y,
                "deltaX": 0,
                "deltaY": delta_y,
            })),
        )
        .await?;
        Ok(())
    }

    /// Type text into the focused element.
    pub async fn type_text(&self, text: &str) -> Result<(), BrowserError> {
        self.call("Input.insertText", Some(json!({"text": text})))
            .await?;
        Ok(())
    }

    /// Press a named key (Enter, Tab, Escape, Backspace, arrows, ...).
    pub async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        let text = match key {
            "Enter" => Some("\r"),
            "Tab" => Some("\t"),
            _ => None,
        };
        let mut down = json!({"type": "keyDown", "key": key});
        if let Some(t) = text {
            down["text"] = json!(t);
        }
        self.call("Input.dispatchKeyEvent", Some(down)).await?;
        self.call(
            "Input.dispatchKeyEvent",
            Some(json!({"type": "keyUp", "key": key})),
        )
        .await?;
        Ok(())
    }

    // ========================================================================
    // Capture
    // ========================================================================

    /// JPEG screenshot of the current viewport.
    pub async fn screenshot_jpeg(&self, quality: u8) -> Result<Vec<u8>, BrowserError> {
        let result = self
            .call(
                "Page.captureScreenshot",
                Some(json!({"format": "jpeg", "quality": quality})),
            )
            .await?;
        let data = result["data"]
            .as_str()
            .ok_or_else(|| BrowserError::InvalidResponse("missing screenshot data".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| BrowserError::InvalidResponse(format!("bad screenshot base64: {}", e)))
    }

    /// Bounded page text for the planner.
    pub async fn visible_text(&self, max_chars: usize) -> Result<String, BrowserError> {
        let expr = format!(
            "(document.body ? document.body.innerText : '').slice(0, {max_chars})"
        );
        let result = self.evaluate(&expr).await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    /// Close this page's target.
    pub async fn close(&self) -> Result<(), BrowserError> {
        self.client.close_page(&self.target_id).await
    }
}
