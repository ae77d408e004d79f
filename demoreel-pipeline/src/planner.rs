//! Step planner
//!
//! Renders the target page (with restored login state when available),
//! extracts a bounded text summary and an interactive-element catalog, and
//! asks the language model for an ordered step list. Degrades to a plain
//! HTTP fetch when rendering fails. No retry here; the orchestrator's job
//! layer owns retry policy.

use std::time::Duration;

use demoreel_browser::{Browser, BrowserConfig, StorageSnapshot};
use demoreel_core::domain::step::ActionKind;
use demoreel_core::dto::step::ProposedStep;
use demoreel_core::error::StageError;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::ChatClient;

const MAX_STEPS: usize = 8;
const MAX_PAGE_TEXT: usize = 4000;
const MAX_ELEMENTS: usize = 40;

const SYSTEM_PROMPT: &str = "You are a product demo planner. Given a page \
summary, propose the steps of a short product walkthrough.\n\
Respond with ONLY a JSON array of at most 8 step objects, no prose. Each \
object has: \"title\" (short), \"action\" (one of \"navigate\", \"click\", \
\"fill\", \"wait\", \"assert\"), \"selector\" (CSS selector, when the action \
targets an element), \"value\" (URL for navigate, text for fill, \
milliseconds for wait), and \"narration\" (one present-tense sentence a \
narrator reads during the step). The first step must always navigate to the \
original URL.";

/// An interactive element surfaced to the model.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    pub selector: String,
    #[serde(default)]
    pub label: String,
}

/// What the planner learned about the page.
#[derive(Debug, Default)]
pub struct PageSummary {
    pub text: String,
    pub elements: Vec<ElementInfo>,
}

/// Proposes demo steps for a URL.
pub struct Planner {
    llm: ChatClient,
    browser_config: BrowserConfig,
    http: reqwest::Client,
}

impl Planner {
    pub fn new(llm: ChatClient, browser_config: BrowserConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_default();
        Self {
            llm,
            browser_config,
            http,
        }
    }

    /// Produce an ordered list of proposed steps for `url`.
    pub async fn plan(
        &self,
        url: &str,
        description: Option<&str>,
        login_state: Option<&Value>,
    ) -> Result<Vec<ProposedStep>, StageError> {
        let summary = match self.render_summary(url, login_state).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("page render failed, degrading to plain fetch: {}", e);
                self.fetch_summary(url).await?
            }
        };

        let user_prompt = build_user_prompt(url, description, &summary);
        let content = self.llm.complete(SYSTEM_PROMPT, &user_prompt).await?;
        let steps = parse_plan_response(&content, url)?;

        info!("planned {} steps for {}", steps.len(), url);
        Ok(steps)
    }

    /// Render the page in a throwaway browser context and extract a summary.
    async fn render_summary(
        &self,
        url: &str,
        login_state: Option<&Value>,
    ) -> Result<PageSummary, StageError> {
        let browser = Browser::launch(&self.browser_config)
            .await
            .map_err(|e| StageError::Browser(e.to_string()))?;

        let result = async {
            let page = browser
                .new_page()
                .await
                .map_err(|e| StageError::Browser(e.to_string()))?;

            if let Some(state) = login_state {
                if let Some(snapshot) = StorageSnapshot::from_value(state) {
                    if let Err(e) = snapshot.restore(&page).await {
                        warn!("login state restore failed: {}", e);
                    }
                }
            }

            page.navigate(url)
                .await
                .map_err(|e| StageError::Browser(e.to_string()))?;

            let text = page
                .visible_text(MAX_PAGE_TEXT)
                .await
                .map_err(|e| StageError::Browser(e.to_string()))?;

            let elements = extract_elements(&page).await.unwrap_or_default();
            Ok(PageSummary { text, elements })
        }
        .await;

        browser.close().await;
        result
    }

    /// Plain HTTP fallback when the browser cannot render the page.
    async fn fetch_summary(&self, url: &str) -> Result<PageSummary, StageError> {
        let body = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StageError::Planning(format!("page fetch failed: {}", e)))?
            .text()
            .await
            .map_err(|e| StageError::Planning(format!("page fetch failed: {}", e)))?;

        let mut text = strip_tags(&body);
        text.truncate(MAX_PAGE_TEXT);
        Ok(PageSummary {
            text,
            elements: Vec::new(),
        })
    }
}

/// Catalog buttons, inputs and links with their most specific selector.
async fn extract_elements(page: &demoreel_browser::Page) -> Result<Vec<ElementInfo>, StageError> {
    let expr = format!(
        r#"JSON.stringify(Array.from(
            document.querySelectorAll('button, input, a, select, textarea, [role="button"]')
        ).slice(0, {MAX_ELEMENTS}).map(el => {{
            let selector;
            if (el.id) selector = '#' + el.id;
            else if (el.name) selector = el.tagName.toLowerCase() + '[name="' + el.name + '"]';
            else if (el.getAttribute('aria-label'))
                selector = el.tagName.toLowerCase() + '[aria-label="' + el.getAttribute('aria-label') + '"]';
            else selector = el.tagName.toLowerCase();
            return {{
                tag: el.tagName.toLowerCase(),
                selector: selector,
                label: (el.innerText || el.value || el.placeholder || '').trim().slice(0, 60),
            }};
        }}))"#
    );
    let dump = page
        .evaluate(&expr)
        .await
        .map_err(|e| StageError::Browser(e.to_string()))?;
    let text = dump.as_str().unwrap_or("[]");
    Ok(serde_json::from_str(text).unwrap_or_default())
}

fn build_user_prompt(url: &str, description: Option<&str>, summary: &PageSummary) -> String {
    let mut prompt = format!("URL: {}\n", url);
    if let Some(desc) = description {
        if !desc.is_empty() {
            prompt.push_str(&format!("What the user wants shown: {}\n", desc));
        }
    }
    prompt.push_str("\nPage text:\n");
    prompt.push_str(&summary.text);
    if !summary.elements.is_empty() {
        prompt.push_str("\n\nInteractive elements:\n");
        for el in &summary.elements {
            prompt.push_str(&format!(
                "- {} `{}` {}\n",
                el.tag,
                el.selector,
                if el.label.is_empty() {
                    String::new()
                } else {
                    format!("({})", el.label)
                }
            ));
        }
    }
    prompt
}

/// Parse the model's reply into proposed steps.
///
/// Tolerates code fences and surrounding prose by slicing the outermost
/// JSON array. Enforces that the plan opens with a navigate to `url` and
/// caps the list at 8 steps.
pub fn parse_plan_response(content: &str, url: &str) -> Result<Vec<ProposedStep>, StageError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(StageError::Planning("model returned empty content".to_string()));
    }

    let start = trimmed
        .find('[')
        .ok_or_else(|| StageError::Planning("no JSON array in model response".to_string()))?;
    let end = trimmed
        .rfind(']')
        .filter(|&end| end > start)
        .ok_or_else(|| StageError::Planning("no JSON array in model response".to_string()))?;

    let mut steps: Vec<ProposedStep> = serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| StageError::Planning(format!("unparsable step array: {}", e)))?;

    if steps.is_empty() {
        return Err(StageError::Planning("model proposed no steps".to_string()));
    }

    if steps[0].action != ActionKind::Navigate {
        steps.insert(0, ProposedStep::navigate_to(url));
    } else if steps[0].value.is_none() {
        steps[0].value = Some(url.to_string());
    }
    steps.truncate(MAX_STEPS);

    Ok(steps)
}

/// Crude tag stripper for the degraded text fetch. Drops markup plus
/// script/style bodies, collapses whitespace.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut rest = html;
    let mut skip_until: Option<&str> = None;

    while let Some(open) = rest.find('<') {
        if skip_until.is_none() {
            out.push_str(&rest[..open]);
        }
        let tag_rest = &rest[open..];
        let Some(close) = tag_rest.find('>') else {
            break;
        };
        let tag = tag_rest[1..close].trim().to_lowercase();
        match skip_until {
            None if tag.starts_with("script") => skip_until = Some("/script"),
            None if tag.starts_with("style") => skip_until = Some("/style"),
            Some(end) if tag.starts_with(end) => skip_until = None,
            _ => {}
        }
        out.push(' ');
        rest = &tag_rest[close + 1..];
    }
    if skip_until.is_none() {
        out.push_str(rest);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://app.example.com";

    #[test]
    fn test_parse_bare_array() {
        let content = r##"[
            {"title": "Open", "action": "navigate", "value": "https://app.example.com",
             "narration": "We open the app."},
            {"title": "Click login", "action": "click", "selector": "#login"}
        ]"##;
        let steps = parse_plan_response(content, URL).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].action, ActionKind::Navigate);
    }

    #[test]
    fn test_parse_fenced_array_with_prose() {
        let content = "Here is the plan:\n```json\n[{\"title\": \"Open\", \"action\": \
                       \"navigate\", \"value\": \"https://app.example.com\"}]\n```\nEnjoy!";
        let steps = parse_plan_response(content, URL).unwrap();
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_missing_navigate_is_prepended() {
        let content = r##"[{"title": "Click", "action": "click", "selector": "#btn"}]"##;
        let steps = parse_plan_response(content, URL).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].action, ActionKind::Navigate);
        assert_eq!(steps[0].value.as_deref(), Some(URL));
        assert_eq!(steps[1].selector.as_deref(), Some("#btn"));
    }

    #[test]
    fn test_navigate_without_value_gets_url() {
        let content = r#"[{"title": "Open", "action": "navigate"}]"#;
        let steps = parse_plan_response(content, URL).unwrap();
        assert_eq!(steps[0].value.as_deref(), Some(URL));
    }

    #[test]
    fn test_caps_at_eight_steps() {
        let step = r##"{"title": "Click", "action": "click", "selector": "#b"}"##;
        let content = format!("[{}]", vec![step; 12].join(","));
        let steps = parse_plan_response(&content, URL).unwrap();
        // 12 proposed + prepended navigate, truncated to 8.
        assert_eq!(steps.len(), 8);
        assert_eq!(steps[0].action, ActionKind::Navigate);
    }

    #[test]
    fn test_empty_and_non_json_rejected() {
        assert!(matches!(
            parse_plan_response("", URL),
            Err(StageError::Planning(_))
        ));
        assert!(matches!(
            parse_plan_response("I cannot help with that.", URL),
            Err(StageError::Planning(_))
        ));
        assert!(matches!(
            parse_plan_response("[]", URL),
            Err(StageError::Planning(_))
        ));
        assert!(matches!(
            parse_plan_response("[{bad json}]", URL),
            Err(StageError::Planning(_))
        ));
    }

    #[test]
    fn test_strip_tags_drops_markup_and_scripts() {
        let html = "<html><head><script>var x = '<div>';</script></head>\
                    <body><h1>Hello</h1> <p>world</p></body></html>";
        let text = strip_tags(html);
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
        assert!(!text.contains("var x"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_user_prompt_mentions_elements() {
        let summary = PageSummary {
            text: "Welcome".to_string(),
            elements: vec![ElementInfo {
                tag: "button".to_string(),
                selector: "#signup".to_string(),
                label: "Sign up".to_string(),
            }],
        };
        let prompt = build_user_prompt(URL, Some("show signup"), &summary);
        assert!(prompt.contains("#signup"));
        assert!(prompt.contains("show signup"));
    }
}
