pub mod repl;
pub mod run_cmd;
pub mod snapshot;
pub mod tools_cmd;

use pagelens_core::{Config, Paths};
use pagelens_tools::browser::{ChromeBackend, PageBackend};
use pagelens_tools::ToolContext;
use std::sync::Arc;
use std::time::Duration;

/// A running browser plus the tool context bound to it.
pub struct Session {
    pub browser: Arc<ChromeBackend>,
    pub ctx: ToolContext,
}

impl Session {
    pub async fn start(url: Option<&str>) -> anyhow::Result<Self> {
        let paths = Paths::new();
        paths.ensure_dirs()?;
        let config = Config::load_or_default(&paths)?;

        let browser = Arc::new(ChromeBackend::launch(&config, &paths).await?);
        let backend: Arc<dyn PageBackend> = browser.clone();
        let ctx = ToolContext::new(config, backend);
        let session = Self { browser, ctx };

        if let Some(url) = url {
            session.goto(url).await?;
        }
        Ok(session)
    }

    /// Navigate the active tab and wait for it to settle.
    pub async fn goto(&self, url: &str) -> anyhow::Result<()> {
        let tab = self.ctx.backend.active_tab().await?;
        self.ctx.backend.navigate(tab.id, url).await?;
        let settle_ms = self.ctx.config.snapshot.load_settle_ms;
        if settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(settle_ms)).await;
        }
        Ok(())
    }

    pub async fn shutdown(self) {
        self.browser.close().await;
    }
}
