//! Browser process lifecycle
//!
//! Launches a throwaway Chrome with its own profile directory and an
//! ephemeral debugging port, and tears everything down on close.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::client::CdpClient;
use crate::error::BrowserError;
use crate::page::Page;

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Browser launch options.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Explicit chrome binary; falls back to well-known names/paths.
    pub chrome_binary: Option<PathBuf>,
    pub headless: bool,
    /// Logical viewport applied to every new page.
    pub viewport: (u32, u32),
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_binary: None,
            headless: true,
            viewport: (1280, 800),
        }
    }
}

/// A running Chrome process plus its CDP connection.
pub struct Browser {
    child: Child,
    client: Arc<CdpClient>,
    profile_dir: PathBuf,
    viewport: (u32, u32),
}

impl Browser {
    /// Locate a usable chrome binary.
    pub fn find_chrome() -> Option<PathBuf> {
        let candidates = [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ];
        candidates
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .or_else(|| {
                std::env::var_os("CHROME_BIN").map(PathBuf::from)
            })
    }

    /// Launch a fresh browser process and connect to it.
    pub async fn launch(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let chrome_path = config
            .chrome_binary
            .clone()
            .or_else(Self::find_chrome)
            .ok_or(BrowserError::ChromeNotFound)?;

        let profile_dir = std::env::temp_dir().join(format!(
            "demoreel-profile-{}",
            std::process::id() as u64 ^ rand_suffix()
        ));
        if let Err(e) = std::fs::create_dir_all(&profile_dir) {
            warn!("failed to create profile directory: {}", e);
        }

        let mut cmd = Command::new(&chrome_path);
        cmd.arg("--remote-debugging-port=0")
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg("--mute-audio")
            .arg(format!(
                "--window-size={},{}",
                config.viewport.0, config.viewport.1
            ))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if config.headless {
            cmd.arg("--headless=new");
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        info!("chrome launched with pid {:?}", child.id());

        // Chrome announces its ephemeral debugging socket on stderr.
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BrowserError::LaunchFailed("no stderr pipe".to_string()))?;
        let ws_url = tokio::time::timeout(LAUNCH_TIMEOUT, read_devtools_url(stderr))
            .await
            .map_err(|_| {
                BrowserError::LaunchFailed("chrome did not announce its socket".to_string())
            })??;

        debug!("devtools socket: {}", ws_url);

        let client = Arc::new(CdpClient::connect(&ws_url).await?);

        Ok(Self {
            child,
            client,
            profile_dir,
            viewport: config.viewport,
        })
    }

    /// Open a new page with the configured viewport applied.
    pub async fn new_page(&self) -> Result<Page, BrowserError> {
        let page = self.client.new_page().await?;
        page.set_viewport(self.viewport.0, self.viewport.1).await?;
        Ok(page)
    }

    pub fn client(&self) -> Arc<CdpClient> {
        Arc::clone(&self.client)
    }

    /// Kill the process and remove the throwaway profile. Safe to call once;
    /// dropping an unclosed browser still kills the child via kill_on_drop.
    pub async fn close(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("failed to kill chrome: {}", e);
        }
        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            debug!("failed to remove profile dir: {}", e);
        }
    }
}

async fn read_devtools_url(
    stderr: tokio::process::ChildStderr,
) -> Result<String, BrowserError> {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(rest) = line.strip_prefix("DevTools listening on ") {
            return Ok(rest.trim().to_string());
        }
    }
    Err(BrowserError::LaunchFailed(
        "stderr closed before DevTools line".to_string(),
    ))
}

fn rand_suffix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0)
}
