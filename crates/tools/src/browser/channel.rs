//! Typed DevTools calls against one tab.
//!
//! Every cross-process operation the engine performs goes through a
//! [`TabChannel`], and every call is bounded by the configured command timeout.
//! These awaits are the only suspension points in the engine.

use pagelens_core::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::backend::{PageBackend, TabId};

#[derive(Clone)]
pub struct TabChannel {
    backend: Arc<dyn PageBackend>,
    tab: TabId,
    timeout: Duration,
}

impl TabChannel {
    pub fn new(backend: Arc<dyn PageBackend>, tab: TabId, timeout: Duration) -> Self {
        Self { backend, tab, timeout }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        debug!(tab = self.tab, method, "CDP call");
        match tokio::time::timeout(self.timeout, self.backend.send_command(self.tab, method, params))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "'{}' on tab {} did not complete within {}ms",
                method,
                self.tab,
                self.timeout.as_millis()
            ))),
        }
    }

    pub async fn get_full_ax_tree(&self) -> Result<Value> {
        self.call("Accessibility.getFullAXTree", json!({})).await
    }

    /// Re-locate a live DOM node. `None` when the node no longer exists.
    pub async fn resolve_node(&self, backend_node_id: i64) -> Result<Option<String>> {
        let result = match self
            .call("DOM.resolveNode", json!({ "backendNodeId": backend_node_id }))
            .await
        {
            Ok(v) => v,
            Err(Error::Cdp { message, .. }) => {
                debug!(backend_node_id, %message, "node no longer resolvable");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        Ok(result
            .get("object")
            .and_then(|o| o.get("objectId"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }

    /// Invoke `function_declaration` with `this` bound to the remote object and
    /// return its JSON value. Page-side exceptions become `Error::Browser`.
    pub async fn call_function_on(
        &self,
        object_id: &str,
        function_declaration: &str,
        args: &[Value],
    ) -> Result<Value> {
        let arguments: Vec<Value> = args.iter().map(|a| json!({ "value": a })).collect();
        let result = self
            .call(
                "Runtime.callFunctionOn",
                json!({
                    "objectId": object_id,
                    "functionDeclaration": function_declaration,
                    "arguments": arguments,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .or_else(|| exception.get("text").and_then(|t| t.as_str()))
                .unwrap_or("unknown exception");
            return Err(Error::Browser(format!("page script threw: {}", text)));
        }
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Like [`Self::call_function_on`] with `this` bound to the page's `document`.
    pub async fn call_in_page(&self, function_declaration: &str, args: &[Value]) -> Result<Value> {
        let document = self
            .call("Runtime.evaluate", json!({ "expression": "document" }))
            .await?;
        let object_id = document
            .get("result")
            .and_then(|r| r.get("objectId"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Browser("page has no document".into()))?
            .to_string();
        let result = self.call_function_on(&object_id, function_declaration, args).await;
        if let Err(e) = self.release_object(&object_id).await {
            debug!(error = %e, "failed to release document handle");
        }
        result
    }

    /// Layout boxes of every rendered node (`DOMSnapshot.captureSnapshot`).
    pub async fn layout_snapshot(&self) -> Result<Value> {
        self.call("DOMSnapshot.captureSnapshot", json!({ "computedStyles": [] }))
            .await
    }

    pub async fn release_object(&self, object_id: &str) -> Result<()> {
        self.call("Runtime.releaseObject", json!({ "objectId": object_id }))
            .await?;
        Ok(())
    }

    pub async fn scroll_into_view(&self, backend_node_id: i64) -> Result<()> {
        self.call(
            "DOM.scrollIntoViewIfNeeded",
            json!({ "backendNodeId": backend_node_id }),
        )
        .await?;
        Ok(())
    }

    pub async fn focus(&self, backend_node_id: i64) -> Result<()> {
        self.call("DOM.focus", json!({ "backendNodeId": backend_node_id }))
            .await?;
        Ok(())
    }

    /// Center of the first content quad, or `None` when the node has no box.
    pub async fn content_center(&self, backend_node_id: i64) -> Result<Option<(f64, f64)>> {
        let result = match self
            .call(
                "DOM.getContentQuads",
                json!({ "backendNodeId": backend_node_id }),
            )
            .await
        {
            Ok(v) => v,
            Err(Error::Cdp { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let quad = result
            .get("quads")
            .and_then(|q| q.as_array())
            .and_then(|q| q.first())
            .and_then(|q| q.as_array());
        Ok(quad.and_then(|points| quad_center(points)))
    }

    pub async fn dispatch_mouse_event(
        &self,
        event_type: &str,
        x: f64,
        y: f64,
        click_count: u32,
    ) -> Result<()> {
        let mut params = json!({
            "type": event_type,
            "x": x,
            "y": y,
        });
        if event_type != "mouseMoved" {
            params["button"] = json!("left");
            params["clickCount"] = json!(click_count);
        }
        self.call("Input.dispatchMouseEvent", params).await?;
        Ok(())
    }
}

fn quad_center(points: &[Value]) -> Option<(f64, f64)> {
    let coords: Vec<f64> = points.iter().filter_map(|v| v.as_f64()).collect();
    if coords.len() != 8 {
        return None;
    }
    let x = (coords[0] + coords[2] + coords[4] + coords[6]) / 4.0;
    let y = (coords[1] + coords[3] + coords[5] + coords[7]) / 4.0;
    let width = (coords[2] - coords[0]).abs().max((coords[4] - coords[6]).abs());
    let height = (coords[5] - coords[1]).abs().max((coords[7] - coords[3]).abs());
    if width == 0.0 && height == 0.0 {
        return None;
    }
    Some((x, y))
}
