//! Single actions against a resolved element.

use pagelens_core::{Error, Result};
use serde_json::json;
use tracing::debug;

use super::editor::{read_editor_value, EditorKind};
use super::resolver::ElementHandle;

pub(crate) const FILL_FN: &str = r#"function(value) {
  const el = this;
  const tag = el.tagName ? el.tagName.toLowerCase() : '';
  const fire = () => {
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
  };
  if (tag === 'select') {
    const option = Array.from(el.options).find(o => o.value === value || o.textContent.trim() === value);
    if (!option) return { ok: false, reason: 'no-such-option' };
    el.value = option.value;
    fire();
    return { ok: true };
  }
  if (tag === 'input' || tag === 'textarea') {
    const textTypes = ['', 'text', 'search', 'email', 'url', 'tel', 'password', 'number',
      'date', 'datetime-local', 'month', 'time', 'week', 'color'];
    if (tag === 'input' && !textTypes.includes((el.type || '').toLowerCase())) {
      return { ok: false, reason: 'not-input' };
    }
    if (el.disabled || el.readOnly) return { ok: false, reason: 'read-only' };
    const proto = tag === 'textarea' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, value);
    fire();
    return { ok: true };
  }
  if (el.isContentEditable) {
    el.textContent = value;
    fire();
    return { ok: true };
  }
  return { ok: false, reason: 'not-input' };
}"#;

#[derive(Debug, Clone, Copy)]
pub struct ClickOptions {
    pub count: u32,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self { count: 1 }
    }
}

impl ClickOptions {
    pub fn double() -> Self {
        Self { count: 2 }
    }
}

/// Borrowed action view over an [`ElementHandle`].
pub struct Locator<'a> {
    handle: &'a mut ElementHandle,
}

impl<'a> Locator<'a> {
    pub(crate) fn new(handle: &'a mut ElementHandle) -> Self {
        Self { handle }
    }

    pub async fn click(&mut self, options: ClickOptions) -> Result<()> {
        let (x, y) = self.center().await?;
        let channel = self.handle.channel();
        channel.dispatch_mouse_event("mouseMoved", x, y, 0).await?;
        for click_count in 1..=options.count.max(1) {
            channel
                .dispatch_mouse_event("mousePressed", x, y, click_count)
                .await?;
            channel
                .dispatch_mouse_event("mouseReleased", x, y, click_count)
                .await?;
        }
        debug!(uid = self.handle.uid(), x, y, count = options.count, "clicked element");
        Ok(())
    }

    pub async fn hover(&mut self) -> Result<()> {
        let (x, y) = self.center().await?;
        self.handle
            .channel()
            .dispatch_mouse_event("mouseMoved", x, y, 0)
            .await?;
        debug!(uid = self.handle.uid(), x, y, "hovered element");
        Ok(())
    }

    pub async fn fill(&mut self, value: &str) -> Result<()> {
        let object_id = self.handle.resolve_live().await?;
        let backend_node_id = self.handle.backend_node_id();
        let channel = self.handle.channel();

        // Focus is best effort; the fill script decides whether the target
        // accepts text.
        if let Err(e) = channel.focus(backend_node_id).await {
            debug!(uid = self.handle.uid(), error = %e, "focus before fill failed");
        }

        let result = channel
            .call_function_on(&object_id, FILL_FN, &[json!(value)])
            .await?;
        if result.get("ok").and_then(|v| v.as_bool()) == Some(true) {
            debug!(uid = self.handle.uid(), chars = value.chars().count(), "filled element");
            return Ok(());
        }
        let reason = result
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        Err(Error::NotAnInputField(format!(
            "{} cannot be filled ({})",
            self.handle.describe(),
            reason
        )))
    }

    /// Text of the code editor or input the element belongs to.
    pub async fn get_editor_value(&mut self) -> Result<Option<String>> {
        Ok(self.detect_editor().await?.map(|(_, value)| value))
    }

    pub async fn detect_editor(&mut self) -> Result<Option<(EditorKind, String)>> {
        let object_id = self.handle.resolve_live().await?;
        read_editor_value(self.handle.channel(), &object_id).await
    }

    async fn center(&mut self) -> Result<(f64, f64)> {
        self.handle.resolve_live().await?;
        let backend_node_id = self.handle.backend_node_id();
        let channel = self.handle.channel();

        if let Err(e) = channel.scroll_into_view(backend_node_id).await {
            match e {
                Error::Cdp { message, .. } => {
                    return Err(Error::ElementNotActionable(format!(
                        "{} cannot be scrolled into view: {}",
                        self.handle.describe(),
                        message
                    )))
                }
                other => return Err(other),
            }
        }
        channel
            .content_center(backend_node_id)
            .await?
            .ok_or_else(|| {
                Error::ElementNotActionable(format!(
                    "{} has no visible box on the page",
                    self.handle.describe()
                ))
            })
    }
}
