//! Agent-facing browser tools: snapshots and search, UID-addressed actions,
//! and whole-page navigation and reading.

use async_trait::async_trait;
use pagelens_core::{Error, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::{Tool, ToolContext, ToolSchema};
use super::backend::{is_restricted_url, TabInfo};
use super::format::format_snapshot;
use super::locator::ClickOptions;
use super::page::{self, ScrollDirection, DEFAULT_SCROLL_PIXELS};

/// Formatted snapshots longer than this are cut; search narrows them down.
const MAX_SNAPSHOT_CHARS: usize = 50_000;

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Validation(format!("Missing required parameter: {}", key)))
}

fn validate_uid(params: &Value) -> Result<()> {
    let uid = required_str(params, "uid")?;
    if uid.trim().is_empty() {
        return Err(Error::Validation("uid must not be empty".into()));
    }
    Ok(())
}

/// Page scripts cannot run on privileged pages.
fn ensure_scriptable(tab: &TabInfo) -> Result<()> {
    if is_restricted_url(&tab.url) {
        return Err(Error::NavigationRestricted(tab.url.clone()));
    }
    Ok(())
}

async fn settle(ctx: &ToolContext) {
    let ms = ctx.config.cdp.action_settle_ms;
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

fn render(text: String) -> String {
    let total = text.chars().count();
    if total <= MAX_SNAPSHOT_CHARS {
        return text;
    }
    format!(
        "{}...\n[truncated, {} total chars; use search_snapshot to narrow down]",
        crate::truncate_chars(&text, MAX_SNAPSHOT_CHARS),
        total
    )
}

async fn snapshot_json(ctx: &ToolContext, tab: &TabInfo) -> Result<Value> {
    let snapshot = ctx.manager.create_snapshot(tab.id).await?;
    Ok(json!({
        "success": true,
        "tabId": tab.id,
        "title": snapshot.title,
        "url": snapshot.url,
        "generation": snapshot.generation,
        "snapshot": render(format_snapshot(&snapshot)),
    }))
}

pub struct TakeSnapshotTool;

#[async_trait]
impl Tool for TakeSnapshotTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "take_snapshot",
            description: "Take a text snapshot of the active page based on its accessibility tree. Every element gets a uid (e1, e2, ...) that the other tools accept. Always use the latest snapshot: uids from older snapshots stop working.",
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, _params: Value) -> Result<Value> {
        let tab = ctx.backend.active_tab().await?;
        snapshot_json(&ctx, &tab).await
    }
}

pub struct SearchSnapshotTool;

#[async_trait]
impl Tool for SearchSnapshotTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "search_snapshot",
            description: "Search the latest snapshot of the active page. Separate alternatives with '|'; '*' and '?' are wildcards and '\\' escapes them. Matching is case-insensitive. Returns matching lines with surrounding context lines. Takes a snapshot first if none exists.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query, e.g. 'Submit|Log*in'"
                    },
                    "contextLevels": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Lines of context to show around each match (default from config, usually 1)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        let query = required_str(params, "query")?;
        if query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        if let Some(levels) = params.get("contextLevels") {
            if !levels.is_null() && levels.as_u64().is_none() {
                return Err(Error::Validation(
                    "contextLevels must be a non-negative integer".into(),
                ));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let context_levels = params
            .get("contextLevels")
            .and_then(|v| v.as_u64())
            .map(|v| usize::try_from(v).unwrap_or(usize::MAX))
            .unwrap_or(ctx.config.search.default_context_levels);

        let tab = ctx.backend.active_tab().await?;
        if ctx.manager.current_snapshot(tab.id).is_none() {
            debug!(tab = tab.id, "no snapshot yet, taking one before search");
            ctx.manager.create_snapshot(tab.id).await?;
        }

        let result = ctx
            .manager
            .search_and_format(tab.id, query, context_levels)
            .unwrap_or_else(|| "No matches found".to_string());
        Ok(json!({
            "success": true,
            "tabId": tab.id,
            "result": result,
        }))
    }
}

pub struct ClickElementTool;

#[async_trait]
impl Tool for ClickElementTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "click_element_by_uid",
            description: "Click the element with the given uid from the latest snapshot.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "uid": {
                        "type": "string",
                        "description": "Element uid from the snapshot, e.g. 'e12'"
                    },
                    "doubleClick": {
                        "type": "boolean",
                        "description": "Double click instead of a single click (default: false)"
                    }
                },
                "required": ["uid"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        validate_uid(params)
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let uid = required_str(&params, "uid")?;
        let options = if params["doubleClick"].as_bool().unwrap_or(false) {
            ClickOptions::double()
        } else {
            ClickOptions::default()
        };

        let tab = ctx.backend.active_tab().await?;
        let mut handle = ctx.manager.require_element(tab.id, uid)?;
        let result = handle.as_locator().click(options).await;
        handle.dispose().await;
        result?;

        settle(&ctx).await;
        Ok(json!({
            "success": true,
            "uid": uid,
            "message": if options.count > 1 {
                format!("Double clicked element {}", uid)
            } else {
                format!("Clicked element {}", uid)
            },
        }))
    }
}

pub struct FillElementTool;

#[async_trait]
impl Tool for FillElementTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "fill_element_by_uid",
            description: "Set the value of an input, textarea, select or contenteditable element with the given uid. Fires input and change events.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "uid": {
                        "type": "string",
                        "description": "Element uid from the snapshot"
                    },
                    "value": {
                        "type": "string",
                        "description": "Value to fill in. For a select, the option value or its visible text."
                    }
                },
                "required": ["uid", "value"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        validate_uid(params)?;
        required_str(params, "value")?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let uid = required_str(&params, "uid")?;
        let value = required_str(&params, "value")?;

        let tab = ctx.backend.active_tab().await?;
        let mut handle = ctx.manager.require_element(tab.id, uid)?;
        let result = handle.as_locator().fill(value).await;
        handle.dispose().await;
        result?;

        settle(&ctx).await;
        Ok(json!({
            "success": true,
            "uid": uid,
            "message": format!("Filled element {}", uid),
        }))
    }
}

pub struct HoverElementTool;

#[async_trait]
impl Tool for HoverElementTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "hover_element_by_uid",
            description: "Move the mouse over the element with the given uid, e.g. to open a menu or show a tooltip.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "uid": {
                        "type": "string",
                        "description": "Element uid from the snapshot"
                    }
                },
                "required": ["uid"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        validate_uid(params)
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let uid = required_str(&params, "uid")?;

        let tab = ctx.backend.active_tab().await?;
        let mut handle = ctx.manager.require_element(tab.id, uid)?;
        let result = handle.as_locator().hover().await;
        handle.dispose().await;
        result?;

        Ok(json!({
            "success": true,
            "uid": uid,
            "message": format!("Hovered element {}", uid),
        }))
    }
}

pub struct GetEditorValueTool;

#[async_trait]
impl Tool for GetEditorValueTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_editor_value_by_uid",
            description: "Read the full text of a code editor (Monaco, CodeMirror, Ace) or input field with the given uid. Use this instead of the snapshot when the content is long or virtualized.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "uid": {
                        "type": "string",
                        "description": "Uid of the editor or any element inside it"
                    }
                },
                "required": ["uid"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        validate_uid(params)
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let uid = required_str(&params, "uid")?;

        let tab = ctx.backend.active_tab().await?;
        let mut handle = ctx.manager.require_element(tab.id, uid)?;
        let result = handle.as_locator().detect_editor().await;
        handle.dispose().await;

        match result? {
            Some((kind, value)) => Ok(json!({
                "success": true,
                "uid": uid,
                "editor": kind.as_str(),
                "length": value.chars().count(),
                "value": value,
            })),
            None => Err(Error::NotSupportedEditor(format!(
                "element {} is not a code editor or input field",
                uid
            ))),
        }
    }
}

pub struct GetPageInfoTool;

#[async_trait]
impl Tool for GetPageInfoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_page_info",
            description: "Get the URL, title, tab id and loading status of the active tab.",
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, _params: Value) -> Result<Value> {
        let tab = ctx.backend.active_tab().await?;
        Ok(json!({
            "success": true,
            "url": tab.url,
            "title": tab.title,
            "id": tab.id,
            "status": tab.status,
        }))
    }
}

pub struct NavigateTool;

#[async_trait]
impl Tool for NavigateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "navigate_to_url",
            description: "Open a URL in the active tab (or a new tab), wait for it to settle and return a fresh snapshot.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Absolute URL to open"
                    },
                    "newTab": {
                        "type": "boolean",
                        "description": "Open the URL in a new tab that becomes the active tab (default: false)"
                    }
                },
                "required": ["url"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        let url = required_str(params, "url")?;
        if url.trim().is_empty() {
            return Err(Error::Validation("url must not be empty".into()));
        }
        if let Some(new_tab) = params.get("newTab") {
            if !new_tab.is_null() && !new_tab.is_boolean() {
                return Err(Error::Validation("newTab must be a boolean".into()));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let url = required_str(&params, "url")?.trim();
        let new_tab = params["newTab"].as_bool().unwrap_or(false);

        let tab_id = if new_tab {
            ctx.backend.open_tab(url).await?
        } else {
            let tab = ctx.backend.active_tab().await?;
            ctx.backend.navigate(tab.id, url).await?;
            tab.id
        };

        let settle_ms = ctx.config.snapshot.load_settle_ms;
        if settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(settle_ms)).await;
        }

        let tab = ctx.backend.tab_info(tab_id).await?;
        match snapshot_json(&ctx, &tab).await {
            Ok(mut snap) => {
                snap["status"] = json!("navigated");
                snap["newTab"] = json!(new_tab);
                Ok(snap)
            }
            Err(e @ Error::NavigationRestricted(_)) => Ok(json!({
                "success": true,
                "status": "navigated",
                "newTab": new_tab,
                "tabId": tab.id,
                "url": tab.url,
                "snapshot": Value::Null,
                "message": e.to_string(),
            })),
            Err(e) => Err(e),
        }
    }
}

pub struct ScrollPageTool;

#[async_trait]
impl Tool for ScrollPageTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "scroll_page",
            description: "Scroll the active page up or down by a number of pixels, or jump to the top or bottom. Take a new snapshot afterwards to see lazily loaded content.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "direction": {
                        "type": "string",
                        "enum": ["up", "down", "top", "bottom"],
                        "description": "Where to scroll"
                    },
                    "pixels": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Distance for up/down (default: 500)"
                    }
                },
                "required": ["direction"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        let direction = required_str(params, "direction")?;
        if ScrollDirection::parse(direction).is_none() {
            return Err(Error::Validation(format!(
                "direction must be one of up, down, top, bottom (got '{}')",
                direction
            )));
        }
        if let Some(pixels) = params.get("pixels") {
            if !pixels.is_null() && !pixels.as_u64().map_or(false, |p| p > 0) {
                return Err(Error::Validation("pixels must be a positive integer".into()));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let direction = required_str(&params, "direction")
            .ok()
            .and_then(ScrollDirection::parse)
            .ok_or_else(|| Error::Validation("direction must be one of up, down, top, bottom".into()))?;
        let pixels = params["pixels"].as_u64().unwrap_or(DEFAULT_SCROLL_PIXELS);

        let tab = ctx.backend.active_tab().await?;
        ensure_scriptable(&tab)?;
        let position = page::scroll(&ctx.manager.channel(tab.id), direction, pixels).await?;
        settle(&ctx).await;

        let message = if direction.is_relative() {
            format!("Scrolled {} by {}px", direction.as_str(), pixels)
        } else {
            format!("Scrolled to {}", direction.as_str())
        };
        Ok(json!({
            "success": true,
            "tabId": tab.id,
            "direction": direction,
            "scrolled": if direction.is_relative() { json!(pixels) } else { Value::Null },
            "scrollY": position.scroll_y,
            "scrollHeight": position.scroll_height,
            "viewportHeight": position.viewport_height,
            "atBottom": position.at_bottom(),
            "message": message,
        }))
    }
}

pub struct GetPageContentTool;

#[async_trait]
impl Tool for GetPageContentTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_page_content",
            description: "Read the visible text of the active page. Without a selector the main content area (article, main, ...) is used. Long text is truncated at 25000 characters.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "selector": {
                        "type": "string",
                        "description": "CSS selector of the element to read (default: main content area)"
                    }
                },
                "required": []
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        if let Some(selector) = params.get("selector") {
            if !selector.is_null() && !selector.is_string() {
                return Err(Error::Validation("selector must be a string".into()));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let selector = params["selector"].as_str();

        let tab = ctx.backend.active_tab().await?;
        ensure_scriptable(&tab)?;
        let content = page::read_content(&ctx.manager.channel(tab.id), selector).await?;
        debug!(
            tab = tab.id,
            selector = %content.selector,
            chars = content.total_length,
            "read page content"
        );
        Ok(json!({
            "success": true,
            "tabId": tab.id,
            "url": tab.url,
            "title": tab.title,
            "selector": content.selector,
            "content": content.content,
            "isTruncated": content.is_truncated,
            "totalLength": content.total_length,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::test_support::{save_page, ElementKind, FakePage};
    use crate::ToolRegistry;
    use pagelens_core::Config;
    use std::sync::Arc;

    fn context(page: &Arc<FakePage>) -> ToolContext {
        let mut config = Config::default();
        config.cdp.action_settle_ms = 0;
        config.snapshot.load_settle_ms = 0;
        ToolContext::new(config, page.clone())
    }

    fn login() -> Arc<FakePage> {
        let page = Arc::new(FakePage::new("https://example.com/login"));
        page.add_element(21, ElementKind::TextInput, "alice");
        page.add_element(22, ElementKind::TextInput, "");
        page.add_element(23, ElementKind::Button, "");
        page
    }

    async fn run(ctx: &ToolContext, name: &str, params: Value) -> Result<Value> {
        ToolRegistry::with_defaults()
            .execute(name, ctx.clone(), params)
            .await
    }

    #[tokio::test]
    async fn test_take_snapshot() {
        let page = login();
        let ctx = context(&page);
        let result = run(&ctx, "take_snapshot", json!({})).await.unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["tabId"], 1);
        assert_eq!(result["generation"], 1);
        assert_eq!(result["url"], "https://example.com/login");
        let text = result["snapshot"].as_str().unwrap();
        assert!(text.starts_with("- RootWebArea \"Sign in\" [uid=e1]"));
        assert!(text.contains("button \"Submit\" [uid=e6]"));
    }

    #[tokio::test]
    async fn test_search_auto_snapshots() {
        let page = login();
        let ctx = context(&page);
        let result = run(&ctx, "search_snapshot", json!({"query": "Submit", "contextLevels": 0}))
            .await
            .unwrap();
        assert_eq!(result["result"], "    - button \"Submit\" [uid=e6]\n");
        assert!(ctx.manager.current_snapshot(1).is_some());

        let result = run(&ctx, "search_snapshot", json!({"query": "checkout"})).await.unwrap();
        assert_eq!(result["result"], "No matches found");
        // The second search reused the existing snapshot.
        assert_eq!(ctx.manager.current_snapshot(1).unwrap().generation, 1);
    }

    #[tokio::test]
    async fn test_search_with_maximal_context() {
        let page = login();
        let ctx = context(&page);
        let result = run(&ctx, "search_snapshot", json!({"query": "Submit", "contextLevels": u64::MAX}))
            .await
            .unwrap();
        let text = result["result"].as_str().unwrap();
        assert!(text.starts_with("- RootWebArea \"Sign in\" [uid=e1]"));
        assert!(text.contains("button \"Submit\" [uid=e6]"));
        assert!(text.contains("Forgot password?"));
    }

    #[tokio::test]
    async fn test_search_validation() {
        let page = login();
        let ctx = context(&page);
        assert!(run(&ctx, "search_snapshot", json!({"query": "  "})).await.is_err());
        assert!(run(&ctx, "search_snapshot", json!({"query": "x", "contextLevels": -1}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_click_and_fill_by_uid() {
        let page = login();
        let ctx = context(&page);
        run(&ctx, "take_snapshot", json!({})).await.unwrap();

        let result = run(&ctx, "click_element_by_uid", json!({"uid": "e6"})).await.unwrap();
        assert_eq!(result["message"], "Clicked element e6");
        let result = run(&ctx, "fill_element_by_uid", json!({"uid": "e5", "value": "s3cret"}))
            .await
            .unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(page.element_value(22).as_deref(), Some("s3cret"));
        // Every handle was disposed.
        assert_eq!(page.release_count(), 2);
    }

    #[tokio::test]
    async fn test_double_click() {
        let page = login();
        let ctx = context(&page);
        run(&ctx, "take_snapshot", json!({})).await.unwrap();
        let result = run(&ctx, "click_element_by_uid", json!({"uid": "e6", "doubleClick": true}))
            .await
            .unwrap();
        assert_eq!(result["message"], "Double clicked element e6");
        let presses = page
            .mouse_events()
            .iter()
            .filter(|(t, _)| t == "mousePressed")
            .count();
        assert_eq!(presses, 2);
    }

    #[tokio::test]
    async fn test_stale_uid_after_resnapshot() {
        let page = login();
        let ctx = context(&page);
        run(&ctx, "take_snapshot", json!({})).await.unwrap();
        run(&ctx, "take_snapshot", json!({})).await.unwrap();
        let err = run(&ctx, "click_element_by_uid", json!({"uid": "e6"})).await.unwrap_err();
        assert!(matches!(err, Error::StaleSnapshot { .. }));
        assert!(err.to_string().contains("take_snapshot"));
    }

    #[tokio::test]
    async fn test_failed_action_still_disposes() {
        let page = login();
        let ctx = context(&page);
        run(&ctx, "take_snapshot", json!({})).await.unwrap();
        let err = run(&ctx, "fill_element_by_uid", json!({"uid": "e6", "value": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotAnInputField(_)));
        assert_eq!(page.release_count(), 1);
    }

    #[tokio::test]
    async fn test_hover() {
        let page = login();
        let ctx = context(&page);
        run(&ctx, "take_snapshot", json!({})).await.unwrap();
        run(&ctx, "hover_element_by_uid", json!({"uid": "e7"})).await.unwrap();
        assert_eq!(page.mouse_events(), vec![("mouseMoved".to_string(), 0)]);
    }

    #[tokio::test]
    async fn test_get_editor_value() {
        let page = Arc::new(FakePage::new("https://example.com/editor"));
        page.set_tree(save_page());
        page.add_element(2, ElementKind::Monaco, "const a = 1;");
        page.add_element(3, ElementKind::Checkbox, "");
        let ctx = context(&page);
        run(&ctx, "take_snapshot", json!({})).await.unwrap();

        let result = run(&ctx, "get_editor_value_by_uid", json!({"uid": "e2"})).await.unwrap();
        assert_eq!(result["value"], "const a = 1;");
        assert_eq!(result["length"], 12);
        assert_eq!(result["editor"], "monaco");

        let err = run(&ctx, "get_editor_value_by_uid", json!({"uid": "e3"})).await.unwrap_err();
        assert!(matches!(err, Error::NotSupportedEditor(_)));
    }

    #[tokio::test]
    async fn test_page_info() {
        let page = login();
        let ctx = context(&page);
        let result = run(&ctx, "get_page_info", json!({})).await.unwrap();
        assert_eq!(result["url"], "https://example.com/login");
        assert_eq!(result["id"], 1);
        assert_eq!(result["status"], "complete");
    }

    #[tokio::test]
    async fn test_no_active_tab() {
        let page = login();
        page.close();
        let ctx = context(&page);
        let err = run(&ctx, "take_snapshot", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::NoActiveTab));
    }

    #[tokio::test]
    async fn test_navigate_snapshots_new_page() {
        let page = Arc::new(FakePage::new("about:blank"));
        page.set_tree(save_page());
        let ctx = context(&page);
        let result = run(&ctx, "navigate_to_url", json!({"url": "https://example.com/editor"}))
            .await
            .unwrap();
        assert_eq!(page.navigations(), vec!["https://example.com/editor".to_string()]);
        assert_eq!(result["status"], "navigated");
        assert_eq!(result["url"], "https://example.com/editor");
        assert!(result["snapshot"].as_str().unwrap().contains("button \"Save\" [uid=e3]"));
    }

    #[tokio::test]
    async fn test_navigate_to_restricted_page() {
        let page = Arc::new(FakePage::new("https://example.com"));
        let ctx = context(&page);
        let result = run(&ctx, "navigate_to_url", json!({"url": "chrome://settings"}))
            .await
            .unwrap();
        assert!(result["snapshot"].is_null());
        assert!(result["message"].as_str().unwrap().contains("chrome://settings"));
    }

    #[tokio::test]
    async fn test_navigate_in_new_tab() {
        let page = login();
        let ctx = context(&page);
        let result = run(
            &ctx,
            "navigate_to_url",
            json!({"url": "https://example.com/docs", "newTab": true}),
        )
        .await
        .unwrap();
        assert_eq!(page.opened_tabs(), vec!["https://example.com/docs".to_string()]);
        assert!(page.navigations().is_empty());
        assert_eq!(result["newTab"], true);
        assert_eq!(result["url"], "https://example.com/docs");
        assert!(result["snapshot"].as_str().unwrap().contains("[uid=e1]"));

        let err = run(&ctx, "navigate_to_url", json!({"url": "https://example.com", "newTab": "yes"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_scroll_page() {
        let page = login();
        let ctx = context(&page);
        let result = run(&ctx, "scroll_page", json!({"direction": "down"})).await.unwrap();
        assert_eq!(result["scrolled"], 500);
        assert_eq!(result["scrollY"], 500.0);
        assert_eq!(result["atBottom"], false);

        let result = run(&ctx, "scroll_page", json!({"direction": "up", "pixels": 200}))
            .await
            .unwrap();
        assert_eq!(result["scrollY"], 300.0);
        assert_eq!(result["message"], "Scrolled up by 200px");

        let result = run(&ctx, "scroll_page", json!({"direction": "bottom"})).await.unwrap();
        assert!(result["scrolled"].is_null());
        assert_eq!(result["atBottom"], true);
        assert_eq!(result["direction"], "bottom");
    }

    #[tokio::test]
    async fn test_scroll_page_validation() {
        let page = login();
        let ctx = context(&page);
        for params in [
            json!({}),
            json!({"direction": "left"}),
            json!({"direction": "down", "pixels": 0}),
            json!({"direction": "down", "pixels": "far"}),
        ] {
            let err = run(&ctx, "scroll_page", params).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        assert!(page.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_page_content() {
        let page = login();
        page.set_content("body", "Sign in\nUsername\nPassword");
        page.set_content("#content", "Username\nPassword");
        let ctx = context(&page);

        let result = run(&ctx, "get_page_content", json!({})).await.unwrap();
        assert_eq!(result["selector"], "#content");
        assert_eq!(result["content"], "Username\nPassword");
        assert_eq!(result["isTruncated"], false);
        assert_eq!(result["totalLength"], 17);

        let err = run(&ctx, "get_page_content", json!({"selector": "aside"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_page_scripts_refused_on_restricted_pages() {
        let page = Arc::new(FakePage::new("chrome://settings"));
        let ctx = context(&page);
        let err = run(&ctx, "get_page_content", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::NavigationRestricted(_)));
        let err = run(&ctx, "scroll_page", json!({"direction": "top"})).await.unwrap_err();
        assert!(matches!(err, Error::NavigationRestricted(_)));
        assert!(page.calls().is_empty());
    }
}
