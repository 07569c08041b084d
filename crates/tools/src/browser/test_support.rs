//! In-memory page for unit tests.

use async_trait::async_trait;
use pagelens_core::{Error, Result};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use super::backend::{PageBackend, TabId, TabInfo, TabStatus};
use super::editor::{ACE_VALUE_FN, CODEMIRROR_VALUE_FN, MONACO_VALUE_FN, PLAIN_VALUE_FN};
use super::locator::FILL_FN;
use super::page::{PAGE_CONTENT_FN, SCROLL_FN};
use super::resolver::IS_CONNECTED_FN;

/// Builds `Accessibility.getFullAXTree` responses.
#[derive(Default)]
pub struct AxTreeBuilder {
    nodes: Vec<Value>,
}

impl AxTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, id: &str, role: &str, name: &str, backend: Option<i64>, children: &[&str]) -> Self {
        let mut node = json!({
            "nodeId": id,
            "ignored": false,
            "role": { "type": "role", "value": role },
            "name": { "type": "computedString", "value": name },
            "childIds": children,
        });
        if let Some(backend) = backend {
            node["backendDOMNodeId"] = json!(backend);
        }
        self.nodes.push(node);
        self
    }

    pub fn prop(mut self, id: &str, name: &str, value: Value) -> Self {
        let kind = match &value {
            Value::Bool(_) => "boolean",
            Value::Number(_) => "integer",
            _ => "string",
        };
        if let Some(node) = self.find(id) {
            if node.get("properties").is_none() {
                node["properties"] = json!([]);
            }
            if let Some(list) = node["properties"].as_array_mut() {
                list.push(json!({ "name": name, "value": { "type": kind, "value": value } }));
            }
        }
        self
    }

    pub fn value(mut self, id: &str, value: &str) -> Self {
        if let Some(node) = self.find(id) {
            node["value"] = json!({ "type": "string", "value": value });
        }
        self
    }

    pub fn ignored(mut self, id: &str) -> Self {
        if let Some(node) = self.find(id) {
            node["ignored"] = json!(true);
        }
        self
    }

    pub fn build(mut self) -> Value {
        let mut parents: Vec<(String, String)> = Vec::new();
        for node in &self.nodes {
            let parent = node["nodeId"].as_str().unwrap_or_default().to_string();
            for child in node["childIds"].as_array().into_iter().flatten() {
                if let Some(child) = child.as_str() {
                    parents.push((child.to_string(), parent.clone()));
                }
            }
        }
        for (child, parent) in parents {
            if let Some(node) = self.find(&child) {
                if node.get("parentId").is_none() {
                    node["parentId"] = json!(parent);
                }
            }
        }
        json!({ "nodes": self.nodes })
    }

    fn find(&mut self, id: &str) -> Option<&mut Value> {
        self.nodes.iter_mut().find(|n| n["nodeId"] == id)
    }
}

/// A login form with the usual noise: a duplicate heading text node, an
/// aria-hidden button, a collapsed banner and a text node in an unnamed div.
pub fn login_page() -> Value {
    AxTreeBuilder::new()
        .node("1", "RootWebArea", "Sign in", Some(1), &["2", "10", "4", "11"])
        .node("2", "heading", "Welcome back", Some(10), &["3"])
        .prop("2", "level", json!(2))
        .node("3", "StaticText", "Welcome back", None, &[])
        .node("10", "region", "Collapsed banner", Some(40), &["15"])
        .prop("10", "hidden", json!(true))
        .node("15", "StaticText", "Collapsed banner", None, &[])
        .node("4", "form", "", Some(20), &["5", "6", "9", "7", "8"])
        .node("5", "textbox", "Username", Some(21), &[])
        .prop("5", "focused", json!(true))
        .value("5", "alice")
        .node("6", "textbox", "Password", Some(22), &[])
        .prop("6", "required", json!(true))
        .node("9", "generic", "", Some(50), &["13"])
        .ignored("9")
        .node("13", "button", "Hidden action", Some(51), &[])
        .ignored("13")
        .node("7", "button", "Submit", Some(23), &["14"])
        .node("14", "StaticText", "Submit", None, &[])
        .node("8", "link", "Login with SSO", Some(24), &[])
        .prop("8", "url", json!("https://sso.example.com/"))
        .node("11", "generic", "", Some(31), &["12"])
        .node("12", "StaticText", "Forgot password?", Some(30), &[])
        .build()
}

/// Root, main landmark and a single "Save" button.
pub fn save_page() -> Value {
    AxTreeBuilder::new()
        .node("1", "RootWebArea", "Editor", Some(1), &["2"])
        .node("2", "main", "", Some(2), &["3"])
        .node("3", "button", "Save", Some(3), &["4"])
        .node("4", "StaticText", "Save", None, &[])
        .build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Div,
    Button,
    Link,
    Checkbox,
    TextInput,
    Textarea,
    Monaco,
    CodeMirror,
    Ace,
}

struct Element {
    kind: ElementKind,
    value: String,
    has_box: bool,
    connected: bool,
}

impl Element {
    fn new(kind: ElementKind, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
            has_box: true,
            connected: true,
        }
    }
}

struct PageState {
    url: String,
    title: String,
    status: TabStatus,
    open: bool,
    tree: Value,
    elements: HashMap<i64, Element>,
    removed: HashSet<i64>,
    objects: HashMap<String, i64>,
    next_object: u64,
    released: usize,
    calls: Vec<String>,
    mouse: Vec<(String, u32)>,
    navigations: Vec<String>,
    deny_scripting: bool,
    failing_scripts: HashMap<String, Value>,
    timed: Vec<(String, Instant)>,
    collapsed: Vec<i64>,
    content: HashMap<String, String>,
    scroll_y: f64,
    opened: Vec<String>,
}

const PAGE_HEIGHT: f64 = 3000.0;
const VIEWPORT_HEIGHT: f64 = 800.0;
/// Object handle `Runtime.evaluate("document")` hands out.
const DOCUMENT_NODE: i64 = 0;

/// A single tab (id 1) whose DevTools endpoint is simulated in memory.
pub struct FakePage {
    state: Mutex<PageState>,
}

pub const FAKE_TAB: TabId = 1;

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            state: Mutex::new(PageState {
                url: url.to_string(),
                title: "Sign in".to_string(),
                status: TabStatus::Complete,
                open: true,
                tree: login_page(),
                elements: HashMap::new(),
                removed: HashSet::new(),
                objects: HashMap::new(),
                next_object: 0,
                released: 0,
                calls: Vec::new(),
                mouse: Vec::new(),
                navigations: Vec::new(),
                deny_scripting: false,
                failing_scripts: HashMap::new(),
                timed: Vec::new(),
                collapsed: Vec::new(),
                content: HashMap::new(),
                scroll_y: 0.0,
                opened: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap()
    }

    pub fn set_tree(&self, tree: Value) {
        self.lock().tree = tree;
    }

    pub fn set_status(&self, status: TabStatus) {
        self.lock().status = status;
    }

    pub fn add_element(&self, backend_node_id: i64, kind: ElementKind, value: &str) {
        self.lock()
            .elements
            .insert(backend_node_id, Element::new(kind, value));
    }

    /// The node disappears: `DOM.resolveNode` fails from now on.
    pub fn remove_node(&self, backend_node_id: i64) {
        self.lock().removed.insert(backend_node_id);
    }

    /// The node still resolves but is no longer in the document.
    pub fn disconnect_node(&self, backend_node_id: i64) {
        let mut state = self.lock();
        state
            .elements
            .entry(backend_node_id)
            .or_insert_with(|| Element::new(ElementKind::Div, ""))
            .connected = false;
    }

    pub fn hide_box(&self, backend_node_id: i64) {
        let mut state = self.lock();
        state
            .elements
            .entry(backend_node_id)
            .or_insert_with(|| Element::new(ElementKind::Div, ""))
            .has_box = false;
    }

    /// The node renders with an empty layout box.
    pub fn collapse_node(&self, backend_node_id: i64) {
        self.lock().collapsed.push(backend_node_id);
    }

    /// Text the element matching `selector` holds.
    pub fn set_content(&self, selector: &str, text: &str) {
        self.lock()
            .content
            .insert(selector.to_string(), text.to_string());
    }

    pub fn deny_scripting(&self) {
        self.lock().deny_scripting = true;
    }

    pub fn close(&self) {
        self.lock().open = false;
    }

    /// Make `script` throw with the given `exceptionDetails`.
    pub fn fail_script(&self, script: &str, exception: Value) {
        self.lock()
            .failing_scripts
            .insert(script.to_string(), exception);
    }

    pub fn release_count(&self) -> usize {
        self.lock().released
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Every call with the (tokio) instant it arrived at.
    pub fn timed_calls(&self) -> Vec<(String, Instant)> {
        self.lock().timed.clone()
    }

    pub fn opened_tabs(&self) -> Vec<String> {
        self.lock().opened.clone()
    }

    pub fn mouse_events(&self) -> Vec<(String, u32)> {
        self.lock().mouse.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn element_value(&self, backend_node_id: i64) -> Option<String> {
        self.lock()
            .elements
            .get(&backend_node_id)
            .map(|e| e.value.clone())
    }
}

fn cdp(method: &str, message: &str) -> Error {
    Error::Cdp {
        method: method.to_string(),
        message: message.to_string(),
    }
}

impl PageState {
    fn info(&self) -> TabInfo {
        TabInfo {
            id: FAKE_TAB,
            url: self.url.clone(),
            title: self.title.clone(),
            window_id: 1,
            status: self.status,
        }
    }

    fn call_function(&mut self, params: &Value) -> Result<Value> {
        const METHOD: &str = "Runtime.callFunctionOn";
        let object_id = params["objectId"].as_str().unwrap_or_default();
        let node = *self
            .objects
            .get(object_id)
            .ok_or_else(|| cdp(METHOD, "Could not find object with given id"))?;
        let script = params["functionDeclaration"].as_str().unwrap_or_default();
        if let Some(exception) = self.failing_scripts.get(script) {
            return Ok(json!({ "result": { "type": "object" }, "exceptionDetails": exception }));
        }
        let args: Vec<&Value> = params["arguments"]
            .as_array()
            .map(|list| list.iter().map(|a| &a["value"]).collect())
            .unwrap_or_default();
        if script == SCROLL_FN {
            return Ok(by_value(self.scroll(&args)));
        }
        if script == PAGE_CONTENT_FN {
            return Ok(by_value(self.page_content(&args)));
        }
        let arg = args
            .first()
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let removed = self.removed.contains(&node);
        let element = self
            .elements
            .entry(node)
            .or_insert_with(|| Element::new(ElementKind::Div, ""));

        let value = if script == IS_CONNECTED_FN {
            json!(element.connected && !removed)
        } else if script == MONACO_VALUE_FN {
            editor_value(element, ElementKind::Monaco)
        } else if script == CODEMIRROR_VALUE_FN {
            editor_value(element, ElementKind::CodeMirror)
        } else if script == ACE_VALUE_FN {
            editor_value(element, ElementKind::Ace)
        } else if script == PLAIN_VALUE_FN {
            match element.kind {
                ElementKind::TextInput | ElementKind::Textarea => json!(element.value),
                _ => Value::Null,
            }
        } else if script == FILL_FN {
            match element.kind {
                ElementKind::TextInput | ElementKind::Textarea => {
                    element.value = arg;
                    json!({ "ok": true })
                }
                _ => json!({ "ok": false, "reason": "not-input" }),
            }
        } else {
            return Err(cdp(METHOD, "unsupported function in fake page"));
        };
        Ok(by_value(value))
    }

    fn scroll(&mut self, args: &[&Value]) -> Value {
        let direction = args.first().and_then(|v| v.as_str()).unwrap_or_default();
        let pixels = args.get(1).and_then(|v| v.as_f64()).unwrap_or_default();
        let max = PAGE_HEIGHT - VIEWPORT_HEIGHT;
        self.scroll_y = match direction {
            "up" => self.scroll_y - pixels,
            "down" => self.scroll_y + pixels,
            "top" => 0.0,
            "bottom" => max,
            _ => self.scroll_y,
        }
        .clamp(0.0, max);
        json!({
            "scrollY": self.scroll_y,
            "scrollHeight": PAGE_HEIGHT,
            "viewportHeight": VIEWPORT_HEIGHT,
        })
    }

    fn page_content(&self, args: &[&Value]) -> Value {
        let selector = args.first().and_then(|v| v.as_str()).unwrap_or_default();
        let found = if selector.is_empty() || selector == "body" {
            args.get(1)
                .and_then(|v| v.as_array())
                .into_iter()
                .flatten()
                .filter_map(|c| c.as_str())
                .find_map(|c| self.content.get(c).map(|text| (c, text)))
        } else {
            self.content.get(selector).map(|text| (selector, text))
        };
        match found {
            Some((used, text)) => json!({ "content": text, "selector": used }),
            None => Value::Null,
        }
    }

    /// `DOMSnapshot.captureSnapshot` with one zero-size box per collapsed
    /// node and a regular box for every other known node.
    fn layout(&self) -> Value {
        let mut ids: Vec<i64> = self.collapsed.clone();
        ids.extend(self.elements.keys().filter(|id| !self.collapsed.contains(id)));
        let bounds: Vec<Value> = ids
            .iter()
            .map(|id| {
                if self.collapsed.contains(id) {
                    json!([0.0, 0.0, 0.0, 0.0])
                } else {
                    json!([0.0, 0.0, 100.0, 20.0])
                }
            })
            .collect();
        let indexes: Vec<usize> = (0..ids.len()).collect();
        json!({
            "documents": [{
                "nodes": { "backendNodeId": ids },
                "layout": { "nodeIndex": indexes, "bounds": bounds },
            }],
            "strings": [],
        })
    }
}

fn by_value(value: Value) -> Value {
    json!({ "result": { "type": "object", "value": value } })
}

fn editor_value(element: &Element, kind: ElementKind) -> Value {
    if element.kind == kind {
        json!(element.value)
    } else {
        Value::Null
    }
}

#[async_trait]
impl PageBackend for FakePage {
    async fn active_tab(&self) -> Result<TabInfo> {
        let state = self.lock();
        if !state.open {
            return Err(Error::NoActiveTab);
        }
        Ok(state.info())
    }

    async fn tab_info(&self, tab: TabId) -> Result<TabInfo> {
        let state = self.lock();
        if tab != FAKE_TAB || !state.open {
            return Err(Error::NotFound(format!("tab {}", tab)));
        }
        Ok(state.info())
    }

    async fn send_command(&self, tab: TabId, method: &str, params: Value) -> Result<Value> {
        let mut state = self.lock();
        if tab != FAKE_TAB || !state.open {
            return Err(cdp(method, "No target with given id found"));
        }
        state.calls.push(method.to_string());
        state.timed.push((method.to_string(), Instant::now()));
        match method {
            "Accessibility.getFullAXTree" => {
                if state.deny_scripting {
                    Err(cdp(method, "Cannot access contents of the page"))
                } else {
                    Ok(state.tree.clone())
                }
            }
            "DOM.resolveNode" => {
                let id = params["backendNodeId"].as_i64().unwrap_or_default();
                if state.removed.contains(&id) {
                    return Err(cdp(method, "No node with given id found"));
                }
                state.next_object += 1;
                let object_id = format!("obj:{}:{}", id, state.next_object);
                state.objects.insert(object_id.clone(), id);
                Ok(json!({ "object": { "type": "object", "objectId": object_id } }))
            }
            "Runtime.evaluate" if params["expression"] == "document" => {
                state.next_object += 1;
                let object_id = format!("obj:document:{}", state.next_object);
                state.objects.insert(object_id.clone(), DOCUMENT_NODE);
                Ok(json!({ "result": { "type": "object", "objectId": object_id } }))
            }
            "DOMSnapshot.captureSnapshot" => Ok(state.layout()),
            "Runtime.callFunctionOn" => state.call_function(&params),
            "Runtime.releaseObject" => {
                let object_id = params["objectId"].as_str().unwrap_or_default();
                if state.objects.remove(object_id).is_some() {
                    state.released += 1;
                }
                Ok(json!({}))
            }
            "DOM.getContentQuads" => {
                let id = params["backendNodeId"].as_i64().unwrap_or_default();
                let has_box = state.elements.get(&id).map(|e| e.has_box).unwrap_or(true);
                if has_box {
                    Ok(json!({ "quads": [[10.0, 10.0, 110.0, 10.0, 110.0, 50.0, 10.0, 50.0]] }))
                } else {
                    Ok(json!({ "quads": [] }))
                }
            }
            "Input.dispatchMouseEvent" => {
                let kind = params["type"].as_str().unwrap_or_default().to_string();
                let count = params["clickCount"].as_u64().unwrap_or(0) as u32;
                state.mouse.push((kind, count));
                Ok(json!({}))
            }
            "Page.navigate" => {
                let url = params["url"].as_str().unwrap_or_default().to_string();
                state.navigations.push(url.clone());
                state.url = url;
                Ok(json!({ "frameId": "F1" }))
            }
            _ => Ok(json!({})),
        }
    }

    /// Single-tab fake: the "new" tab replaces the current page and keeps id 1.
    async fn open_tab(&self, url: &str) -> Result<TabId> {
        let mut state = self.lock();
        state.opened.push(url.to_string());
        state.url = url.to_string();
        state.open = true;
        state.scroll_y = 0.0;
        Ok(FAKE_TAB)
    }
}
