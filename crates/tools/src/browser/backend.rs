//! The browser-side contract the snapshot engine is written against.
//!
//! Anything that can report tabs and forward a DevTools command to a tab can
//! drive the engine: a launched Chrome (see [`super::session::ChromeBackend`])
//! or an in-memory fake in tests.

use async_trait::async_trait;
use pagelens_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Numeric tab identifier, stable for the lifetime of the tab.
pub type TabId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    pub title: String,
    pub window_id: u32,
    pub status: TabStatus,
}

#[async_trait]
pub trait PageBackend: Send + Sync {
    /// The tab the agent is currently looking at. Fails with `NoActiveTab`.
    async fn active_tab(&self) -> Result<TabInfo>;

    async fn tab_info(&self, tab: TabId) -> Result<TabInfo>;

    /// One DevTools round trip against `tab`. Protocol-level failures are
    /// reported as `Error::Cdp`.
    async fn send_command(&self, tab: TabId, method: &str, params: Value) -> Result<Value>;

    /// Load `url` in `tab`. Returns once the navigation has been committed,
    /// not when the page has finished loading.
    async fn navigate(&self, tab: TabId, url: &str) -> Result<()> {
        let result = self
            .send_command(tab, "Page.navigate", serde_json::json!({ "url": url }))
            .await?;
        match result.get("errorText").and_then(|v| v.as_str()) {
            Some(text) if !text.is_empty() => Err(Error::Browser(format!(
                "navigation to {} failed: {}",
                url, text
            ))),
            _ => Ok(()),
        }
    }

    /// Open `url` in a new tab, make it the active tab and return its id.
    async fn open_tab(&self, url: &str) -> Result<TabId> {
        Err(Error::Browser(format!(
            "this browser backend cannot open new tabs (requested {})",
            url
        )))
    }
}

const RESTRICTED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "chrome-untrusted://",
    "edge://",
    "extension://",
    "devtools://",
    "view-source:",
    "https://chrome.google.com/webstore",
    "https://chromewebstore.google.com",
];

/// Privileged pages where script access is denied.
pub fn is_restricted_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    if lower.starts_with("about:") {
        return lower != "about:blank";
    }
    RESTRICTED_PREFIXES.iter().any(|p| lower.starts_with(p))
}
