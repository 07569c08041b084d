//! From a snapshot UID to a handle on the live element.
//!
//! A handle does not pin the DOM node. Each action re-resolves it from the
//! backend node id and checks it is still attached, so a handle taken before
//! a re-render fails with `ElementDetached` instead of acting on a ghost.

use pagelens_core::{Error, Result};
use tracing::{debug, warn};

use super::backend::TabId;
use super::channel::TabChannel;
use super::locator::Locator;
use super::snapshot::SnapshotNode;
use super::store::SnapshotStore;

pub(crate) const IS_CONNECTED_FN: &str = "function() { return this.isConnected; }";

/// Owned by the caller. Call [`ElementHandle::dispose`] once done.
pub struct ElementHandle {
    channel: TabChannel,
    node: SnapshotNode,
    backend_node_id: i64,
    /// Remote object from the most recent resolution.
    object_id: Option<String>,
    disposed: bool,
}

impl ElementHandle {
    pub(crate) fn new(channel: TabChannel, node: SnapshotNode, backend_node_id: i64) -> Self {
        Self {
            channel,
            node,
            backend_node_id,
            object_id: None,
            disposed: false,
        }
    }

    pub fn tab_id(&self) -> TabId {
        self.channel.tab()
    }

    pub fn uid(&self) -> &str {
        &self.node.uid
    }

    pub fn node(&self) -> &SnapshotNode {
        &self.node
    }

    pub fn backend_node_id(&self) -> i64 {
        self.backend_node_id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn as_locator(&mut self) -> Locator<'_> {
        Locator::new(self)
    }

    pub(crate) fn channel(&self) -> &TabChannel {
        &self.channel
    }

    /// A short human description used in error messages.
    pub(crate) fn describe(&self) -> String {
        if self.node.name.is_empty() {
            format!("{} ({})", self.node.uid, self.node.role)
        } else {
            format!("{} ({} \"{}\")", self.node.uid, self.node.role, self.node.name)
        }
    }

    /// Locate the live element again and confirm it is still in the document.
    /// Returns the fresh remote object id.
    pub(crate) async fn resolve_live(&mut self) -> Result<String> {
        if self.disposed {
            return Err(Error::Other(format!(
                "element handle {} was already disposed",
                self.node.uid
            )));
        }

        let object_id = match self.channel.resolve_node(self.backend_node_id).await? {
            Some(id) => id,
            None => return Err(self.detached()),
        };
        if let Some(previous) = self.object_id.replace(object_id.clone()) {
            if let Err(e) = self.channel.release_object(&previous).await {
                debug!(uid = %self.node.uid, error = %e, "failed to release previous remote object");
            }
        }

        match self
            .channel
            .call_function_on(&object_id, IS_CONNECTED_FN, &[])
            .await
        {
            Ok(v) if v.as_bool() == Some(true) => Ok(object_id),
            Ok(_) | Err(Error::Cdp { .. }) => Err(self.detached()),
            Err(e) => Err(e),
        }
    }

    fn detached(&self) -> Error {
        Error::ElementDetached {
            uid: self.node.uid.clone(),
        }
    }

    /// Release the remote object. Safe to call more than once; only the first
    /// call talks to the page.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(object_id) = self.object_id.take() {
            if let Err(e) = self.channel.release_object(&object_id).await {
                debug!(uid = %self.node.uid, error = %e, "releaseObject failed during dispose");
            }
        }
    }
}

impl Drop for ElementHandle {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        warn!(
            uid = %self.node.uid,
            tab = self.channel.tab(),
            "element handle dropped without dispose"
        );
        if let Some(object_id) = self.object_id.take() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let channel = self.channel.clone();
                runtime.spawn(async move {
                    let _ = channel.release_object(&object_id).await;
                });
            }
        }
    }
}

/// Look `uid` up in the tab's current snapshot and wrap it in a handle.
///
/// Unknown UIDs (including those of superseded snapshots) are `StaleSnapshot`;
/// nodes with no DOM counterpart are `ElementNotActionable`.
pub fn resolve_element(store: &SnapshotStore, channel: TabChannel, uid: &str) -> Result<ElementHandle> {
    let node = store
        .get_node_by_uid(channel.tab(), uid)
        .ok_or_else(|| Error::StaleSnapshot { uid: uid.to_string() })?;
    let backend_node_id = node.backend_node_id.ok_or_else(|| {
        Error::ElementNotActionable(format!("{} ({}) has no DOM node to act on", uid, node.role))
    })?;
    Ok(ElementHandle::new(channel, node, backend_node_id))
}
