//! Login-state capture and restore
//!
//! A [`StorageSnapshot`] is the opaque login state stored on a demo:
//! cookies for the whole browser context plus localStorage for the origins
//! visited in the session.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::BrowserError;
use crate::page::Page;

/// Serialized browser storage snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSnapshot {
    pub cookies: Vec<CdpCookie>,
    pub origins: Vec<OriginStorage>,
}

/// A cookie in CDP wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

/// localStorage entries for one origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginStorage {
    pub origin: String,
    pub entries: Vec<(String, String)>,
}

impl StorageSnapshot {
    /// Capture cookies and the current origin's localStorage from a page.
    pub async fn capture(page: &Page) -> Result<Self, BrowserError> {
        let result = page.call("Storage.getCookies", None).await?;
        let cookies: Vec<CdpCookie> =
            serde_json::from_value(result["cookies"].clone()).unwrap_or_default();

        let mut origins = Vec::new();
        let origin = page
            .evaluate("window.location.origin")
            .await?
            .as_str()
            .unwrap_or("")
            .to_string();
        if !origin.is_empty() && origin != "null" {
            let dump = page
                .evaluate("JSON.stringify(Object.entries(localStorage))")
                .await
                .unwrap_or(serde_json::Value::Null);
            if let Some(text) = dump.as_str() {
                if let Ok(entries) = serde_json::from_str::<Vec<(String, String)>>(text) {
                    if !entries.is_empty() {
                        origins.push(OriginStorage { origin, entries });
                    }
                }
            }
        }

        debug!(
            "captured storage snapshot: {} cookies, {} origins",
            cookies.len(),
            origins.len()
        );
        Ok(Self { cookies, origins })
    }

    /// Restore the snapshot into a fresh page's browser context. Cookies are
    /// set first so origin navigations used for localStorage replay are
    /// already authenticated.
    pub async fn restore(&self, page: &Page) -> Result<(), BrowserError> {
        if !self.cookies.is_empty() {
            page.call(
                "Storage.setCookies",
                Some(json!({"cookies": self.cookies})),
            )
            .await?;
        }

        for origin in &self.origins {
            if let Err(e) = page.navigate(&origin.origin).await {
                warn!("skipping localStorage for {}: {}", origin.origin, e);
                continue;
            }
            for (key, value) in &origin.entries {
                let expr = format!(
                    "localStorage.setItem({}, {})",
                    serde_json::to_string(key)?,
                    serde_json::to_string(value)?
                );
                if let Err(e) = page.evaluate(&expr).await {
                    warn!("failed to restore localStorage key: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Parse a snapshot back out of the opaque JSON stored on a demo.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_camel_case_wire_shape() {
        let cookie: CdpCookie = serde_json::from_str(
            r#"{"name": "sid", "value": "abc", "domain": ".example.com",
                "path": "/", "expires": 1700000000.0, "httpOnly": true,
                "secure": true, "sameSite": "Lax"}"#,
        )
        .unwrap();
        assert!(cookie.http_only);
        assert_eq!(cookie.same_site.as_deref(), Some("Lax"));

        let json = serde_json::to_value(&cookie).unwrap();
        assert_eq!(json["httpOnly"], true);
        assert!(json.get("http_only").is_none());
    }

    #[test]
    fn test_snapshot_round_trip_preserves_cookies() {
        let snapshot = StorageSnapshot {
            cookies: vec![CdpCookie {
                name: "sid".to_string(),
                value: "abc".to_string(),
                domain: ".example.com".to_string(),
                path: "/".to_string(),
                expires: None,
                http_only: false,
                secure: false,
                same_site: None,
            }],
            origins: vec![OriginStorage {
                origin: "https://example.com".to_string(),
                entries: vec![("token".to_string(), "xyz".to_string())],
            }],
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        let back = StorageSnapshot::from_value(&value).unwrap();
        assert_eq!(back.cookies.len(), 1);
        assert_eq!(back.cookies[0].name, "sid");
        assert_eq!(back.origins[0].entries[0].0, "token");
    }

    #[test]
    fn test_from_value_rejects_garbage() {
        assert!(StorageSnapshot::from_value(&serde_json::json!("not an object")).is_none());
    }
}
