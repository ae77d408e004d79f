//! Interactive browser sessions
//!
//! Holds one live browser per demo so a user can log in by hand before
//! recording. Sessions are in-memory only: a restart drops them and the
//! user starts over. Each entry carries its own lock so a slow screenshot
//! on one session never blocks input on another.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use demoreel_browser::{Browser, BrowserConfig, Page, StorageSnapshot};
use demoreel_core::dto::session::InputEvent;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no active session for this demo")]
    NotFound,

    #[error("browser error: {0}")]
    Browser(String),
}

struct SessionEntry {
    browser: Option<Browser>,
    page: Option<Page>,
    last_touched: Instant,
}

impl SessionEntry {
    /// Tear down the entry's browser. Safe to call twice.
    async fn teardown(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Some(browser) = self.browser.take() {
            browser.close().await;
        }
    }
}

pub struct SessionRegistry {
    entries: Mutex<HashMap<Uuid, Arc<Mutex<SessionEntry>>>>,
    browser_config: BrowserConfig,
    idle_timeout: Duration,
    settle_delay: Duration,
}

impl SessionRegistry {
    pub fn new(
        browser_config: BrowserConfig,
        idle_timeout: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            browser_config,
            idle_timeout,
            settle_delay,
        }
    }

    /// Start a session for a demo, replacing any existing one.
    pub async fn start(&self, demo_id: Uuid, url: &str) -> Result<(), SessionError> {
        let browser = Browser::launch(&self.browser_config)
            .await
            .map_err(|e| SessionError::Browser(e.to_string()))?;
        let page = match browser.new_page().await {
            Ok(page) => page,
            Err(e) => {
                browser.close().await;
                return Err(SessionError::Browser(e.to_string()));
            }
        };

        // The user may want to navigate elsewhere by hand, so a failed
        // initial navigation still yields a usable session.
        if let Err(e) = page.navigate(url).await {
            warn!("session {} initial navigation failed: {}", demo_id, e);
        }

        self.install(
            demo_id,
            SessionEntry {
                browser: Some(browser),
                page: Some(page),
                last_touched: Instant::now(),
            },
        )
        .await;
        info!("session started for demo {}", demo_id);
        Ok(())
    }

    /// Install an entry in the map, tearing down whichever entry it
    /// displaces. Concurrent starts for one demo both land here; the loser's
    /// session is the one torn down, never leaked.
    async fn install(&self, demo_id: Uuid, entry: SessionEntry) {
        let displaced = self
            .entries
            .lock()
            .await
            .insert(demo_id, Arc::new(Mutex::new(entry)));
        if let Some(old) = displaced {
            old.lock().await.teardown().await;
        }
    }

    /// Look up the entry for a demo, if one exists.
    async fn entry(&self, demo_id: Uuid) -> Result<Arc<Mutex<SessionEntry>>, SessionError> {
        self.entries
            .lock()
            .await
            .get(&demo_id)
            .cloned()
            .ok_or(SessionError::NotFound)
    }

    /// Capture the current viewport as JPEG bytes.
    pub async fn screenshot(&self, demo_id: Uuid) -> Result<Vec<u8>, SessionError> {
        let entry = self.entry(demo_id).await?;
        let mut entry = entry.lock().await;
        entry.last_touched = Instant::now();
        let page = entry.page.as_ref().ok_or(SessionError::NotFound)?;
        page.screenshot_jpeg(70)
            .await
            .map_err(|e| SessionError::Browser(e.to_string()))
    }

    /// Relay one user input event into the session's page.
    pub async fn relay_input(&self, demo_id: Uuid, event: InputEvent) -> Result<(), SessionError> {
        let entry = self.entry(demo_id).await?;
        let mut entry = entry.lock().await;
        entry.last_touched = Instant::now();
        let page = entry.page.as_ref().ok_or(SessionError::NotFound)?;

        let result = match &event {
            InputEvent::Click { x, y } => page.click(*x, *y).await,
            InputEvent::Type { text } => page.type_text(text).await,
            InputEvent::Key { name } => page.press_key(name).await,
            InputEvent::Navigate { url } => page.navigate(url).await,
            InputEvent::Scroll { x, y, delta_y } => page.scroll(*x, *y, *delta_y).await,
        };
        result.map_err(|e| SessionError::Browser(e.to_string()))?;

        // Let the page react before the next screenshot poll.
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }

    /// Extract the session's login state and tear the browser down.
    pub async fn save_and_close(&self, demo_id: Uuid) -> Result<serde_json::Value, SessionError> {
        let entry = {
            let mut entries = self.entries.lock().await;
            entries.remove(&demo_id).ok_or(SessionError::NotFound)?
        };
        let mut entry = entry.lock().await;

        let snapshot = match entry.page.as_ref() {
            Some(page) => StorageSnapshot::capture(page)
                .await
                .map_err(|e| SessionError::Browser(e.to_string())),
            None => Err(SessionError::NotFound),
        };
        entry.teardown().await;

        let snapshot = snapshot?;
        let value = serde_json::to_value(&snapshot)
            .map_err(|e| SessionError::Browser(e.to_string()))?;
        info!("session for demo {} saved and closed", demo_id);
        Ok(value)
    }

    /// Close a session if one exists. Idempotent.
    pub async fn close(&self, demo_id: Uuid) {
        let entry = self.entries.lock().await.remove(&demo_id);
        if let Some(entry) = entry {
            entry.lock().await.teardown().await;
            info!("session for demo {} closed", demo_id);
        }
    }

    /// Close sessions whose last activity is older than the idle timeout.
    pub async fn reap_idle(&self) {
        let expired: Vec<Uuid> = {
            let entries = self.entries.lock().await;
            let mut expired = Vec::new();
            for (id, entry) in entries.iter() {
                if let Ok(entry) = entry.try_lock() {
                    if entry.last_touched.elapsed() >= self.idle_timeout {
                        expired.push(*id);
                    }
                }
            }
            expired
        };

        for id in expired {
            warn!("session for demo {} idle, reaping", id);
            self.close(id).await;
        }
    }
}

/// Periodically reap idle sessions until the registry is dropped.
pub fn spawn_idle_reaper(registry: Arc<SessionRegistry>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(30));
        loop {
            tick.tick().await;
            registry.reap_idle().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            BrowserConfig::default(),
            Duration::from_secs(180),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_close_without_session_is_a_no_op() {
        let registry = registry();
        registry.close(Uuid::new_v4()).await;
        registry.close(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn test_relay_input_without_session_is_not_found() {
        let registry = registry();
        let result = registry
            .relay_input(Uuid::new_v4(), InputEvent::Type { text: "hi".into() })
            .await;
        assert!(matches!(result, Err(SessionError::NotFound)));
    }

    #[tokio::test]
    async fn test_save_without_session_is_not_found() {
        let registry = registry();
        let result = registry.save_and_close(Uuid::new_v4()).await;
        assert!(matches!(result, Err(SessionError::NotFound)));
    }

    #[tokio::test]
    async fn test_reap_idle_with_empty_registry() {
        let registry = registry();
        registry.reap_idle().await;
    }

    fn empty_entry() -> SessionEntry {
        SessionEntry {
            browser: None,
            page: None,
            last_touched: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_install_replaces_the_previous_entry() {
        let registry = registry();
        let demo_id = Uuid::new_v4();

        registry.install(demo_id, empty_entry()).await;
        registry.install(demo_id, empty_entry()).await;
        assert_eq!(registry.entries.lock().await.len(), 1);

        registry.close(demo_id).await;
        assert!(registry.entries.lock().await.is_empty());
        registry.close(demo_id).await;
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let mut entry = empty_entry();
        entry.teardown().await;
        entry.teardown().await;
        assert!(entry.browser.is_none());
        assert!(entry.page.is_none());
    }
}
