//! Per-tab snapshot slots and UID allocation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::backend::TabId;
use super::snapshot::{Snapshot, SnapshotDraft, SnapshotNode};

/// Hands out `{prefix}{n}` identifiers. The counter only moves forward, so a
/// UID is never issued twice for the same tab, even across snapshots.
#[derive(Debug)]
pub struct UidAllocator {
    prefix: String,
    next: AtomicU64,
}

impl UidAllocator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }

    /// Number of UIDs issued so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

struct TabSlot {
    generation: u64,
    current: Option<Arc<Snapshot>>,
    uids: Arc<UidAllocator>,
}

/// Holds the latest snapshot of every tab.
///
/// Slots are replaced wholesale under a short lock that is never held across
/// an await, so readers see either the previous snapshot or the new one.
pub struct SnapshotStore {
    uid_prefix: String,
    tabs: RwLock<HashMap<TabId, TabSlot>>,
}

impl SnapshotStore {
    pub fn new(uid_prefix: &str) -> Self {
        Self {
            uid_prefix: uid_prefix.to_string(),
            tabs: RwLock::new(HashMap::new()),
        }
    }

    /// The tab's allocator, creating the slot on first use.
    pub fn allocator(&self, tab: TabId) -> Arc<UidAllocator> {
        if let Some(slot) = self.read().get(&tab) {
            return slot.uids.clone();
        }
        let mut tabs = self.write();
        tabs.entry(tab)
            .or_insert_with(|| TabSlot {
                generation: 0,
                current: None,
                uids: Arc::new(UidAllocator::new(&self.uid_prefix)),
            })
            .uids
            .clone()
    }

    /// Publish a draft as the tab's newest snapshot. The generation is taken
    /// here, so commit order and generation order always agree.
    ///
    /// `uids` must be the allocator the draft was built with. If the slot was
    /// cleared (or cleared and recreated) since, the draft's UIDs belong to a
    /// dead counter and the draft is dropped: returns `None`.
    pub fn commit(
        &self,
        tab: TabId,
        uids: &Arc<UidAllocator>,
        draft: SnapshotDraft,
    ) -> Option<Arc<Snapshot>> {
        let mut tabs = self.write();
        let slot = tabs
            .get_mut(&tab)
            .filter(|slot| Arc::ptr_eq(&slot.uids, uids))?;
        slot.generation += 1;
        let snapshot = Arc::new(draft.into_snapshot(tab, slot.generation));
        slot.current = Some(snapshot.clone());
        Some(snapshot)
    }

    pub fn current(&self, tab: TabId) -> Option<Arc<Snapshot>> {
        self.read().get(&tab).and_then(|slot| slot.current.clone())
    }

    pub fn generation(&self, tab: TabId) -> u64 {
        self.read().get(&tab).map(|slot| slot.generation).unwrap_or(0)
    }

    /// Look a UID up in the tab's current generation only.
    pub fn get_node_by_uid(&self, tab: TabId, uid: &str) -> Option<SnapshotNode> {
        self.current(tab).and_then(|s| s.get(uid).cloned())
    }

    /// Drop the tab's slot, e.g. when the tab closes.
    pub fn clear_tab(&self, tab: TabId) -> bool {
        self.write().remove(&tab).is_some()
    }

    pub fn tabs(&self) -> Vec<TabId> {
        let mut ids: Vec<TabId> = self.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TabId, TabSlot>> {
        self.tabs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<TabId, TabSlot>> {
        self.tabs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
