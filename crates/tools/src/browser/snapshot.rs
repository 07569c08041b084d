//! Accessibility tree snapshot and UID system.
//!
//! Converts Chrome's accessibility tree into a compact, immutable snapshot whose
//! nodes carry UIDs (e1, e2, ...) the agent can hand back to act on elements.
//! The snapshot is an arena in depth-first pre-order; a UID is an index into it.

use chrono::{DateTime, Utc};
use pagelens_core::config::SnapshotConfig;
use pagelens_core::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

use super::backend::{is_restricted_url, TabId, TabInfo, TabStatus};
use super::channel::TabChannel;
use super::store::UidAllocator;

pub type NodeIndex = usize;

/// One entry in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotNode {
    pub uid: String,
    pub role: String,
    pub name: String,
    pub backend_node_id: Option<i64>,
    pub attributes: BTreeMap<String, String>,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    pub depth: usize,
}

impl SnapshotNode {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }
}

/// An immutable capture of one tab. Replaced, never edited.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tab_id: TabId,
    pub generation: u64,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub title: String,
    nodes: Vec<SnapshotNode>,
    index: HashMap<String, NodeIndex>,
}

impl Snapshot {
    pub fn root(&self) -> &SnapshotNode {
        &self.nodes[0]
    }

    /// All nodes in document order.
    pub fn nodes(&self) -> &[SnapshotNode] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> Option<&SnapshotNode> {
        self.nodes.get(index)
    }

    pub fn get(&self, uid: &str) -> Option<&SnapshotNode> {
        self.index.get(uid).map(|&i| &self.nodes[i])
    }

    pub fn children<'a>(&'a self, node: &'a SnapshotNode) -> impl Iterator<Item = &'a SnapshotNode> + 'a {
        node.children.iter().map(move |&i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn uids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.uid.as_str())
    }
}

/// A captured tree that has not been committed to the store yet.
/// The generation is assigned at commit time.
#[derive(Debug, Clone)]
pub struct SnapshotDraft {
    pub url: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    nodes: Vec<SnapshotNode>,
}

impl SnapshotDraft {
    pub fn nodes(&self) -> &[SnapshotNode] {
        &self.nodes
    }

    pub(crate) fn into_snapshot(self, tab_id: TabId, generation: u64) -> Snapshot {
        let index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.uid.clone(), i))
            .collect();
        Snapshot {
            tab_id,
            generation,
            timestamp: self.timestamp,
            url: self.url,
            title: self.title,
            nodes: self.nodes,
            index,
        }
    }
}

/// Roles considered interactive (buttons, inputs, links, etc.).
const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "textbox", "searchbox", "combobox", "listbox",
    "menuitem", "menuitemcheckbox", "menuitemradio", "option",
    "radio", "checkbox", "switch", "slider", "spinbutton",
    "tab", "treeitem", "gridcell", "columnheader", "rowheader",
    "textField", "TextField", "select", "PopUpButton",
];

/// Roles that never carry information of their own; children are promoted.
const DECORATIVE_ROLES: &[&str] = &[
    "none", "presentation", "InlineTextBox", "LineBreak", "Ignored",
];

/// Roles that are structural containers; skipped when unnamed.
const STRUCTURAL_ROLES: &[&str] = &["generic", "GenericContainer", "Section", "div"];

const VALUE_ATTRIBUTE_MAX: usize = 200;

pub struct SnapshotBuilder<'a> {
    config: &'a SnapshotConfig,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(config: &'a SnapshotConfig) -> Self {
        Self { config }
    }

    /// Read the tab's accessibility tree and turn it into a draft.
    /// Privileged pages fail with `NavigationRestricted`; no partial tree is returned.
    pub async fn capture(
        &self,
        channel: &TabChannel,
        tab: &TabInfo,
        uids: &UidAllocator,
    ) -> Result<SnapshotDraft> {
        if is_restricted_url(&tab.url) {
            return Err(Error::NavigationRestricted(tab.url.clone()));
        }
        if tab.status == TabStatus::Loading && self.config.load_settle_ms > 0 {
            debug!(tab = tab.id, "tab still loading, waiting before snapshot");
            tokio::time::sleep(Duration::from_millis(self.config.load_settle_ms)).await;
        }

        let tree = match channel.get_full_ax_tree().await {
            Ok(tree) => tree,
            Err(Error::Cdp { message, .. }) if is_injection_denied(&message) => {
                return Err(Error::NavigationRestricted(tab.url.clone()));
            }
            Err(e) => return Err(e),
        };

        let collapsed = match channel.layout_snapshot().await {
            Ok(layout) => zero_size_nodes(&layout),
            Err(e) => {
                debug!(tab = tab.id, error = %e, "layout capture failed, keeping zero-size nodes");
                HashSet::new()
            }
        };

        let draft = self.build_excluding(&tree, uids, &tab.url, &tab.title, &collapsed)?;
        debug!(
            tab = tab.id,
            nodes = draft.nodes.len(),
            collapsed = collapsed.len(),
            "captured accessibility snapshot"
        );
        Ok(draft)
    }

    /// Convert a raw `Accessibility.getFullAXTree` response into a draft.
    pub fn build(&self, tree: &Value, uids: &UidAllocator, url: &str, title: &str) -> Result<SnapshotDraft> {
        self.build_excluding(tree, uids, url, title, &HashSet::new())
    }

    /// As [`Self::build`], treating nodes in `collapsed` (backend ids with no
    /// layout area) like unnamed containers: skipped, children promoted.
    pub fn build_excluding(
        &self,
        tree: &Value,
        uids: &UidAllocator,
        url: &str,
        title: &str,
        collapsed: &HashSet<i64>,
    ) -> Result<SnapshotDraft> {
        let raw = RawTree::parse(tree)
            .ok_or_else(|| Error::Browser("accessibility tree is empty".into()))?;

        let mut walker = Walker {
            raw: &raw,
            config: self.config,
            uids,
            collapsed,
            nodes: Vec::new(),
            visited: HashSet::new(),
        };
        walker.visit(raw.root, None, 0, "");

        if walker.nodes.is_empty() {
            return Err(Error::Browser("accessibility tree has no visible root".into()));
        }

        Ok(SnapshotDraft {
            url: url.to_string(),
            title: title.to_string(),
            timestamp: Utc::now(),
            nodes: walker.nodes,
        })
    }
}

/// Backend ids whose every layout box has zero width or height.
fn zero_size_nodes(layout: &Value) -> HashSet<i64> {
    let mut empty = HashSet::new();
    let mut sized = HashSet::new();
    let documents = layout.get("documents").and_then(|d| d.as_array());
    for doc in documents.into_iter().flatten() {
        let backend_ids = doc.pointer("/nodes/backendNodeId").and_then(|v| v.as_array());
        let node_index = doc.pointer("/layout/nodeIndex").and_then(|v| v.as_array());
        let bounds = doc.pointer("/layout/bounds").and_then(|v| v.as_array());
        let (Some(backend_ids), Some(node_index), Some(bounds)) = (backend_ids, node_index, bounds) else {
            continue;
        };
        for (index, rect) in node_index.iter().zip(bounds) {
            let Some(id) = index
                .as_u64()
                .and_then(|i| backend_ids.get(i as usize))
                .and_then(|v| v.as_i64())
            else {
                continue;
            };
            let side = |i: usize| rect.get(i).and_then(|v| v.as_f64()).unwrap_or(0.0);
            if side(2) > 0.0 && side(3) > 0.0 {
                sized.insert(id);
            } else {
                empty.insert(id);
            }
        }
    }
    empty.retain(|id| !sized.contains(id));
    empty
}

fn is_injection_denied(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("cannot access") || lower.contains("cannot be scripted") || lower.contains("chrome-extension://")
}

struct RawTree<'v> {
    nodes: HashMap<&'v str, &'v Value>,
    root: &'v str,
}

impl<'v> RawTree<'v> {
    fn parse(tree: &'v Value) -> Option<Self> {
        let list = tree.get("nodes").and_then(|v| v.as_array())?;
        let mut nodes = HashMap::new();
        for node in list {
            if let Some(id) = node.get("nodeId").and_then(|v| v.as_str()) {
                nodes.insert(id, node);
            }
        }
        let root = list
            .iter()
            .find(|n| n.get("parentId").is_none())
            .or_else(|| list.first())
            .and_then(|n| n.get("nodeId"))
            .and_then(|v| v.as_str())?;
        Some(Self { nodes, root })
    }

    fn get(&self, id: &str) -> Option<&'v Value> {
        self.nodes.get(id).copied()
    }

    fn child_ids(&self, node: &'v Value) -> Vec<&'v str> {
        node.get("childIds")
            .and_then(|v| v.as_array())
            .map(|ids| ids.iter().filter_map(|id| id.as_str()).collect())
            .unwrap_or_default()
    }

    /// Concatenated visible text below `node`, used as a name fallback.
    fn descendant_text(&self, node: &'v Value, out: &mut String, budget: usize) {
        for id in self.child_ids(node) {
            if out.len() >= budget {
                return;
            }
            let Some(child) = self.get(id) else { continue };
            if is_ignored(child) || properties(child).get("hidden").map(|v| v == "true").unwrap_or(false) {
                continue;
            }
            if ax_string(child, "role") == "StaticText" {
                let text = ax_string(child, "name");
                if !text.trim().is_empty() {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(text.trim());
                }
            } else {
                self.descendant_text(child, out, budget);
            }
        }
    }
}

struct Walker<'w, 'v> {
    raw: &'w RawTree<'v>,
    config: &'w SnapshotConfig,
    uids: &'w UidAllocator,
    collapsed: &'w HashSet<i64>,
    nodes: Vec<SnapshotNode>,
    visited: HashSet<&'v str>,
}

impl<'w, 'v> Walker<'w, 'v> {
    fn visit(&mut self, id: &'v str, parent: Option<NodeIndex>, depth: usize, parent_name: &str) {
        let Some(node) = self.raw.get(id) else { return };
        if !self.visited.insert(id) {
            return;
        }

        let props = properties(node);
        if props.get("hidden").map(|v| v == "true").unwrap_or(false) {
            return;
        }

        let role = ax_string(node, "role");
        let raw_name = normalize_whitespace(&ax_string(node, "name"));
        let is_root = parent.is_none();

        if !is_root && role == "StaticText" {
            if raw_name.is_empty() || raw_name == parent_name {
                return;
            }
        }

        let backend_node_id = node.get("backendDOMNodeId").and_then(|v| v.as_i64());
        let skip_self = !is_root
            && (is_ignored(node)
                || backend_node_id.map_or(false, |id| self.collapsed.contains(&id))
                || DECORATIVE_ROLES.iter().any(|r| r.eq_ignore_ascii_case(&role))
                || (raw_name.is_empty()
                    && STRUCTURAL_ROLES.iter().any(|r| r.eq_ignore_ascii_case(&role))));

        if skip_self {
            for child in self.raw.child_ids(node) {
                self.visit(child, parent, depth, parent_name);
            }
            return;
        }

        let full_name = self.accessible_name(node, &role, raw_name, &props);
        let index = self.nodes.len();
        self.nodes.push(SnapshotNode {
            uid: self.uids.allocate(),
            role: if role.is_empty() { "generic".to_string() } else { role },
            name: truncate_name(&full_name, self.config.max_name_length),
            backend_node_id,
            attributes: collect_attributes(node, &props, &full_name),
            parent,
            children: Vec::new(),
            depth,
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(index);
        }

        for child in self.raw.child_ids(node) {
            self.visit(child, Some(index), depth + 1, &full_name);
        }
    }

    /// ARIA-computed name first, then description, then visible text, then placeholder.
    fn accessible_name(
        &self,
        node: &'v Value,
        role: &str,
        name: String,
        props: &BTreeMap<String, String>,
    ) -> String {
        if !name.is_empty() {
            return name;
        }
        let description = normalize_whitespace(&ax_string(node, "description"));
        if !description.is_empty() {
            return description;
        }
        let wants_text = role == "heading" || INTERACTIVE_ROLES.iter().any(|r| r.eq_ignore_ascii_case(role));
        if wants_text {
            let mut text = String::new();
            self.raw
                .descendant_text(node, &mut text, self.config.max_name_length * 2);
            let text = normalize_whitespace(&text);
            if !text.is_empty() {
                return text;
            }
        }
        props
            .get("placeholder")
            .map(|p| normalize_whitespace(p))
            .unwrap_or_default()
    }
}

fn is_ignored(node: &Value) -> bool {
    node.get("ignored").and_then(|v| v.as_bool()).unwrap_or(false)
}

fn ax_string(node: &Value, field: &str) -> String {
    node.get(field)
        .and_then(|v| {
            // CDP returns {type: "...", value: "..."} for role/name/value/description
            v.get("value")
                .and_then(|val| val.as_str())
                .or_else(|| v.as_str())
        })
        .unwrap_or("")
        .to_string()
}

fn properties(node: &Value) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    if let Some(list) = node.get("properties").and_then(|v| v.as_array()) {
        for prop in list {
            let Some(name) = prop.get("name").and_then(|v| v.as_str()) else { continue };
            let value = prop.get("value").and_then(|v| v.get("value"));
            let text = match value {
                Some(Value::Bool(b)) => b.to_string(),
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => match n.as_i64() {
                    Some(i) => i.to_string(),
                    None => n.to_string(),
                },
                _ => continue,
            };
            props.insert(name.to_string(), text);
        }
    }
    props
}

/// Properties surfaced on a node, with the key they are rendered under.
const FLAG_PROPERTIES: &[&str] = &["disabled", "focused", "required", "readonly", "multiline", "selected"];
const STATE_PROPERTIES: &[&str] = &["checked", "pressed", "expanded", "level"];

fn collect_attributes(node: &Value, props: &BTreeMap<String, String>, name: &str) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();

    let value = normalize_whitespace(&ax_string(node, "value"));
    if !value.is_empty() && value != name {
        attrs.insert("value".to_string(), truncate_name(&value, VALUE_ATTRIBUTE_MAX));
    }
    for key in FLAG_PROPERTIES {
        if props.get(*key).map(|v| v == "true").unwrap_or(false) {
            attrs.insert(key.to_string(), "true".to_string());
        }
    }
    for key in STATE_PROPERTIES {
        if let Some(v) = props.get(*key) {
            attrs.insert(key.to_string(), v.clone());
        }
    }
    if let Some(url) = props.get("url").filter(|u| !u.is_empty()) {
        attrs.insert("href".to_string(), url.clone());
    }
    attrs
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_name(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let kept: String = name.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}
