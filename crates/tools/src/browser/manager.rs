//! The engine façade the tools talk to.

use pagelens_core::config::{Config, SnapshotConfig};
use pagelens_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::backend::{PageBackend, TabId, TabInfo};
use super::channel::TabChannel;
use super::format::format_snapshot;
use super::resolver::{resolve_element, ElementHandle};
use super::search::search_snapshot;
use super::snapshot::{Snapshot, SnapshotBuilder, SnapshotNode};
use super::store::SnapshotStore;

pub struct SnapshotManager {
    backend: Arc<dyn PageBackend>,
    store: Arc<SnapshotStore>,
    snapshot_config: SnapshotConfig,
    command_timeout: Duration,
}

impl SnapshotManager {
    pub fn new(backend: Arc<dyn PageBackend>, store: Arc<SnapshotStore>, config: &Config) -> Self {
        Self {
            backend,
            store,
            snapshot_config: config.snapshot.clone(),
            command_timeout: Duration::from_millis(config.cdp.command_timeout_ms),
        }
    }

    /// A manager with its own store, keyed by the configured UID prefix.
    pub fn with_backend(backend: Arc<dyn PageBackend>, config: &Config) -> Self {
        let store = Arc::new(SnapshotStore::new(&config.snapshot.uid_prefix));
        Self::new(backend, store, config)
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn PageBackend> {
        &self.backend
    }

    pub fn channel(&self, tab: TabId) -> TabChannel {
        TabChannel::new(self.backend.clone(), tab, self.command_timeout)
    }

    pub async fn active_tab(&self) -> Result<TabInfo> {
        self.backend.active_tab().await
    }

    /// Capture the tab and make the result its current snapshot.
    pub async fn create_snapshot(&self, tab: TabId) -> Result<Arc<Snapshot>> {
        let info = self.backend.tab_info(tab).await?;
        let uids = self.store.allocator(tab);
        let draft = SnapshotBuilder::new(&self.snapshot_config)
            .capture(&self.channel(tab), &info, &uids)
            .await?;
        let Some(snapshot) = self.store.commit(tab, &uids, draft) else {
            warn!(tab, "tab was cleared during capture, dropping snapshot");
            return Err(Error::NotFound(format!(
                "tab {} was closed while its snapshot was being captured",
                tab
            )));
        };
        info!(
            tab,
            generation = snapshot.generation,
            nodes = snapshot.len(),
            url = %snapshot.url,
            "snapshot committed"
        );
        Ok(snapshot)
    }

    pub fn current_snapshot(&self, tab: TabId) -> Option<Arc<Snapshot>> {
        self.store.current(tab)
    }

    pub fn format_snapshot(&self, tab: TabId) -> Option<String> {
        self.store.current(tab).map(|s| format_snapshot(&s))
    }

    /// `None` when the tab has no snapshot, the query is empty, or nothing matches.
    pub fn search_and_format(&self, tab: TabId, query: &str, context_levels: usize) -> Option<String> {
        let snapshot = self.store.current(tab)?;
        search_snapshot(&snapshot, query, context_levels)
    }

    pub fn get_node_by_uid(&self, tab: TabId, uid: &str) -> Option<SnapshotNode> {
        self.store.get_node_by_uid(tab, uid)
    }

    pub fn get_element_by_uid(&self, tab: TabId, uid: &str) -> Option<ElementHandle> {
        self.require_element(tab, uid).ok()
    }

    /// Like [`Self::get_element_by_uid`] but says why the UID cannot be used.
    pub fn require_element(&self, tab: TabId, uid: &str) -> Result<ElementHandle> {
        resolve_element(&self.store, self.channel(tab), uid)
    }

    /// Forget everything about a closed tab.
    pub fn clear_tab(&self, tab: TabId) -> bool {
        let cleared = self.store.clear_tab(tab);
        if cleared {
            info!(tab, "cleared snapshot slot");
        }
        cleared
    }
}
