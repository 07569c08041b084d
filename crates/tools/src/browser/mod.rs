//! Accessibility snapshots of live pages and UID-addressed element actions.
//!
//! - Snapshot: the page's accessibility tree, filtered and tagged with UIDs
//! - Store: one current snapshot per tab, replaced on every capture
//! - Resolver + Locator: act on a UID after re-locating its live element
//! - Backends: a launched Chromium over CDP, or any other `PageBackend`

pub mod backend;
pub mod cdp;
pub mod channel;
pub mod editor;
pub mod format;
pub mod locator;
pub mod manager;
pub mod page;
pub mod resolver;
pub mod search;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod tool;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{PageBackend, TabId, TabInfo, TabStatus};
pub use locator::{ClickOptions, Locator};
pub use manager::SnapshotManager;
pub use page::{PageContent, ScrollDirection, ScrollPosition};
pub use resolver::ElementHandle;
pub use session::ChromeBackend;
pub use snapshot::{Snapshot, SnapshotNode};
