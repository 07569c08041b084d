//! Launching a Chromium-family browser and driving its tabs over CDP.
//!
//! The browser-level connection handles target management; every tab gets its
//! own page-level connection. Tabs are addressed by small numeric ids handed
//! out here, never by CDP target ids.

use async_trait::async_trait;
use pagelens_core::config::Config;
use pagelens_core::{Error, Paths, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::backend::{PageBackend, TabId, TabInfo, TabStatus};
use super::cdp::CdpClient;

/// Supported browser engines. Both speak the Chromium DevTools protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BrowserEngine {
    Chrome,
    Edge,
}

impl BrowserEngine {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "edge" | "msedge" => Self::Edge,
            _ => Self::Chrome,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
        }
    }
}

struct Tab {
    target_id: String,
    window_id: u32,
    cdp: Arc<CdpClient>,
}

/// A launched browser process plus its open tabs.
pub struct ChromeBackend {
    engine: BrowserEngine,
    debug_port: u16,
    user_data_dir: PathBuf,
    process: Mutex<Option<Child>>,
    browser: CdpClient,
    tabs: RwLock<HashMap<TabId, Tab>>,
    active: Mutex<Option<TabId>>,
    next_tab: AtomicU32,
    command_timeout: Duration,
}

impl ChromeBackend {
    /// Start the browser and attach to its initial blank tab.
    pub async fn launch(config: &Config, paths: &Paths) -> Result<Self> {
        let engine = BrowserEngine::parse(&config.browser.engine);
        let browser_path = match &config.browser.executable {
            Some(path) => path.clone(),
            None => find_browser_binary(engine).ok_or_else(|| {
                Error::Browser(format!("{} not found. Please install it or set browser.executable.", engine.name()))
            })?,
        };

        let user_data_dir = config
            .browser
            .user_data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| paths.profile_dir());
        std::fs::create_dir_all(&user_data_dir)?;

        let debug_port = find_free_port().await?;
        let args = build_browser_args(
            debug_port,
            &user_data_dir,
            config.browser.headless,
            (config.browser.window_width, config.browser.window_height),
        );

        info!(
            port = debug_port,
            headless = config.browser.headless,
            browser = engine.name(),
            "Launching browser"
        );

        let child = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Browser(format!("failed to launch {}: {}", engine.name(), e)))?;

        let command_timeout = Duration::from_millis(config.cdp.command_timeout_ms);
        let browser_ws_url = wait_for_cdp_ready(debug_port, config.browser.launch_timeout_secs).await?;
        let browser = CdpClient::connect(&browser_ws_url, command_timeout).await?;

        let backend = Self {
            engine,
            debug_port,
            user_data_dir,
            process: Mutex::new(Some(child)),
            browser,
            tabs: RwLock::new(HashMap::new()),
            active: Mutex::new(None),
            next_tab: AtomicU32::new(1),
            command_timeout,
        };

        let (target_id, page_ws_url) = get_page_ws_url(debug_port).await?;
        let tab = backend.attach(&target_id, &page_ws_url).await?;
        info!(tab, ws_url = %page_ws_url, "CDP connection established (page target)");
        Ok(backend)
    }

    pub fn engine(&self) -> BrowserEngine {
        self.engine
    }

    pub fn debug_port(&self) -> u16 {
        self.debug_port
    }

    pub fn user_data_dir(&self) -> &Path {
        &self.user_data_dir
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        let mut ids: Vec<TabId> = self.read_tabs().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Close a tab. The caller is responsible for clearing its snapshot slot.
    pub async fn close_tab(&self, tab: TabId) -> Result<()> {
        let target_id = self
            .read_tabs()
            .get(&tab)
            .map(|t| t.target_id.clone())
            .ok_or_else(|| Error::NotFound(format!("tab {}", tab)))?;
        self.browser
            .send_command("Target.closeTarget", json!({ "targetId": target_id }))
            .await?;

        let remaining = {
            let mut tabs = self.tabs.write().unwrap_or_else(PoisonError::into_inner);
            tabs.remove(&tab);
            tabs.keys().min().copied()
        };
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if *active == Some(tab) {
            *active = remaining;
        }
        info!(tab, "closed tab");
        Ok(())
    }

    /// Close the browser. Best effort: the process is killed regardless.
    pub async fn close(&self) {
        if let Err(e) = self.browser.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
        let child = self
            .process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut child) = child {
            let _ = child.kill().await;
        }
    }

    async fn attach(&self, target_id: &str, ws_url: &str) -> Result<TabId> {
        let cdp = CdpClient::connect(ws_url, self.command_timeout).await?;
        for domain in ["Page", "DOM", "Runtime", "Accessibility"] {
            cdp.enable_domain(domain).await?;
        }

        let window_id = match self
            .browser
            .send_command("Browser.getWindowForTarget", json!({ "targetId": target_id }))
            .await
        {
            Ok(v) => v.get("windowId").and_then(|w| w.as_u64()).unwrap_or(0) as u32,
            Err(e) => {
                debug!(error = %e, "Browser.getWindowForTarget unavailable");
                0
            }
        };

        let tab = self.next_tab.fetch_add(1, Ordering::SeqCst);
        self.tabs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                tab,
                Tab {
                    target_id: target_id.to_string(),
                    window_id,
                    cdp: Arc::new(cdp),
                },
            );
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(tab);
        Ok(tab)
    }

    fn read_tabs(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TabId, Tab>> {
        self.tabs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn client(&self, tab: TabId) -> Result<(Arc<CdpClient>, String, u32)> {
        self.read_tabs()
            .get(&tab)
            .map(|t| (t.cdp.clone(), t.target_id.clone(), t.window_id))
            .ok_or_else(|| Error::NotFound(format!("tab {}", tab)))
    }
}

#[async_trait]
impl PageBackend for ChromeBackend {
    async fn active_tab(&self) -> Result<TabInfo> {
        let active = *self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active {
            Some(tab) => self.tab_info(tab).await,
            None => Err(Error::NoActiveTab),
        }
    }

    async fn tab_info(&self, tab: TabId) -> Result<TabInfo> {
        let (cdp, target_id, window_id) = self.client(tab)?;
        let info = self
            .browser
            .send_command("Target.getTargetInfo", json!({ "targetId": target_id }))
            .await?;
        let target = info.get("targetInfo").cloned().unwrap_or(Value::Null);
        let status = match cdp.evaluate("document.readyState").await {
            Ok(v) if v.as_str() == Some("complete") => TabStatus::Complete,
            Ok(_) => TabStatus::Loading,
            Err(e) => {
                debug!(tab, error = %e, "could not read document.readyState");
                TabStatus::Complete
            }
        };
        Ok(TabInfo {
            id: tab,
            url: target
                .get("url")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            title: target
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            window_id,
            status,
        })
    }

    async fn send_command(&self, tab: TabId, method: &str, params: Value) -> Result<Value> {
        let (cdp, _, _) = self.client(tab)?;
        cdp.send_command(method, params).await
    }

    async fn navigate(&self, tab: TabId, url: &str) -> Result<()> {
        let (cdp, _, _) = self.client(tab)?;
        let mut loaded = cdp.subscribe_event("Page.loadEventFired").await;
        let result = cdp
            .send_command("Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(text) = result.get("errorText").and_then(|v| v.as_str()) {
            if !text.is_empty() {
                return Err(Error::Browser(format!("navigation to {} failed: {}", url, text)));
            }
        }
        // Same-document navigations never fire a load event.
        if result.get("loaderId").is_some() {
            if tokio::time::timeout(self.command_timeout, loaded.recv())
                .await
                .is_err()
            {
                warn!(tab, url, "page did not finish loading in time");
            }
        }
        info!(tab, url, "navigated");
        Ok(())
    }

    async fn open_tab(&self, url: &str) -> Result<TabId> {
        let result = self
            .browser
            .send_command("Target.createTarget", json!({ "url": url }))
            .await?;
        let target_id = result
            .get("targetId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Browser("no targetId returned from createTarget".into()))?
            .to_string();
        let ws_url = get_target_ws_url(self.debug_port, &target_id).await?;
        let tab = self.attach(&target_id, &ws_url).await?;
        info!(tab, url, "opened tab");
        Ok(tab)
    }
}

impl Drop for ChromeBackend {
    fn drop(&mut self) {
        if let Ok(mut process) = self.process.lock() {
            if let Some(child) = process.as_mut() {
                let _ = child.start_kill();
            }
        }
    }
}

/// Command line for a Chromium-family browser with remote debugging enabled.
fn build_browser_args(
    debug_port: u16,
    user_data_dir: &Path,
    headless: bool,
    window: (u32, u32),
) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--metrics-recording-only".to_string(),
        "--safebrowsing-disable-auto-update".to_string(),
        "--password-store=basic".to_string(),
        "--force-renderer-accessibility".to_string(),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }
    args.push(format!("--window-size={},{}", window.0, window.1));
    args.push("about:blank".to_string());
    args
}

/// Find a browser binary on the system for the given engine.
pub fn find_browser_binary(engine: BrowserEngine) -> Option<String> {
    let candidates = match engine {
        BrowserEngine::Chrome => {
            if cfg!(target_os = "macos") {
                vec![
                    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                    "/Applications/Chromium.app/Contents/MacOS/Chromium",
                    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
                ]
            } else if cfg!(target_os = "linux") {
                vec![
                    "google-chrome",
                    "google-chrome-stable",
                    "chromium",
                    "chromium-browser",
                    "/usr/bin/google-chrome",
                    "/usr/bin/chromium",
                ]
            } else {
                vec![
                    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                ]
            }
        }
        BrowserEngine::Edge => {
            if cfg!(target_os = "macos") {
                vec!["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"]
            } else if cfg!(target_os = "linux") {
                vec!["microsoft-edge", "microsoft-edge-stable", "/usr/bin/microsoft-edge"]
            } else {
                vec![
                    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                ]
            }
        }
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Poll `/json/version` until the browser-level WebSocket URL is published.
async fn wait_for_cdp_ready(port: u16, timeout_secs: u64) -> Result<String> {
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Timeout(format!(
                "browser CDP endpoint not ready after {}s on port {}",
                timeout_secs, port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

async fn list_targets(port: u16) -> Option<Vec<Value>> {
    let url = format!("http://127.0.0.1:{}/json/list", port);
    let resp = reqwest::get(&url).await.ok()?;
    resp.json().await.ok()
}

/// First "page" target as `(targetId, webSocketDebuggerUrl)`. Retries because
/// the initial tab can take a moment to appear.
async fn get_page_ws_url(port: u16) -> Result<(String, String)> {
    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let Some(targets) = list_targets(port).await else { continue };
        if let Some(found) = targets.iter().find_map(page_target) {
            return Ok(found);
        }
    }
    Err(Error::Browser("no page target found after retries".into()))
}

async fn get_target_ws_url(port: u16, target_id: &str) -> Result<String> {
    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let Some(targets) = list_targets(port).await else { continue };
        let found = targets
            .iter()
            .filter_map(page_target)
            .find(|(id, _)| id == target_id);
        if let Some((_, ws_url)) = found {
            return Ok(ws_url);
        }
    }
    Err(Error::Browser(format!(
        "no WebSocket URL found for target '{}' after retries",
        target_id
    )))
}

fn page_target(target: &Value) -> Option<(String, String)> {
    if target.get("type").and_then(|v| v.as_str()) != Some("page") {
        return None;
    }
    let id = target.get("id").or_else(|| target.get("targetId"))?.as_str()?;
    let ws_url = target.get("webSocketDebuggerUrl")?.as_str()?;
    Some((id.to_string(), ws_url.to_string()))
}
