//! Reading the text of rich code editors.
//!
//! Code editors keep their document in a JS model rather than in the DOM node
//! the accessibility tree points at, so each editor family gets an adapter
//! that knows where to look. Adapters are tried in [`detection_chain`] order.

use async_trait::async_trait;
use pagelens_core::{Error, Result};
use serde::Serialize;
use tracing::debug;

use super::channel::TabChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorKind {
    Monaco,
    CodeMirror,
    Ace,
    PlainInput,
}

impl EditorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monaco => "monaco",
            Self::CodeMirror => "codemirror",
            Self::Ace => "ace",
            Self::PlainInput => "plain",
        }
    }
}

pub(crate) const MONACO_VALUE_FN: &str = r#"function() {
  const monaco = window.monaco;
  if (!monaco || !monaco.editor) return null;
  const host = this.closest('.monaco-editor') || (this.querySelector && this.querySelector('.monaco-editor'));
  if (!host) return null;
  const editors = monaco.editor.getEditors ? monaco.editor.getEditors() : [];
  for (const ed of editors) {
    const node = ed.getDomNode && ed.getDomNode();
    if (node && (node === host || node.contains(host) || host.contains(node))) {
      const model = ed.getModel();
      return model ? model.getValue() : null;
    }
  }
  const models = monaco.editor.getModels();
  return models.length === 1 ? models[0].getValue() : null;
}"#;

pub(crate) const CODEMIRROR_VALUE_FN: &str = r#"function() {
  const cm5 = this.closest('.CodeMirror');
  if (cm5 && cm5.CodeMirror) return cm5.CodeMirror.getValue();
  const cm6 = this.closest('.cm-editor');
  if (!cm6) return null;
  const content = cm6.querySelector('.cm-content');
  const view = content && content.cmView && content.cmView.view;
  if (view && view.state) return view.state.doc.toString();
  const lines = cm6.querySelectorAll('.cm-line');
  if (lines.length) return Array.from(lines).map(l => l.textContent).join('\n');
  return null;
}"#;

pub(crate) const ACE_VALUE_FN: &str = r#"function() {
  const host = this.closest('.ace_editor');
  if (!host) return null;
  if (host.env && host.env.editor) return host.env.editor.getValue();
  if (window.ace && window.ace.edit) {
    try { return window.ace.edit(host).getValue(); } catch (e) { return null; }
  }
  return null;
}"#;

pub(crate) const PLAIN_VALUE_FN: &str = r#"function() {
  const tag = this.tagName ? this.tagName.toLowerCase() : '';
  if (tag === 'textarea' || tag === 'input' || tag === 'select') return this.value;
  if (this.isContentEditable) return this.innerText;
  return null;
}"#;

#[async_trait]
pub trait EditorAdapter: Send + Sync {
    fn kind(&self) -> EditorKind;

    /// Page function evaluated with `this` bound to the element. Returns the
    /// editor text, or `null` when the element is not this kind of editor.
    fn script(&self) -> &'static str;

    async fn read_value(&self, channel: &TabChannel, object_id: &str) -> Result<Option<String>> {
        let value = channel.call_function_on(object_id, self.script(), &[]).await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }
}

pub struct MonacoAdapter;
pub struct CodeMirrorAdapter;
pub struct AceAdapter;
pub struct PlainInputAdapter;

impl EditorAdapter for MonacoAdapter {
    fn kind(&self) -> EditorKind {
        EditorKind::Monaco
    }
    fn script(&self) -> &'static str {
        MONACO_VALUE_FN
    }
}

impl EditorAdapter for CodeMirrorAdapter {
    fn kind(&self) -> EditorKind {
        EditorKind::CodeMirror
    }
    fn script(&self) -> &'static str {
        CODEMIRROR_VALUE_FN
    }
}

impl EditorAdapter for AceAdapter {
    fn kind(&self) -> EditorKind {
        EditorKind::Ace
    }
    fn script(&self) -> &'static str {
        ACE_VALUE_FN
    }
}

impl EditorAdapter for PlainInputAdapter {
    fn kind(&self) -> EditorKind {
        EditorKind::PlainInput
    }
    fn script(&self) -> &'static str {
        PLAIN_VALUE_FN
    }
}

/// Adapters in priority order. Specific editors come before the plain
/// fallback because their hidden textareas would otherwise win.
pub fn detection_chain() -> Vec<Box<dyn EditorAdapter>> {
    vec![
        Box::new(MonacoAdapter),
        Box::new(CodeMirrorAdapter),
        Box::new(AceAdapter),
        Box::new(PlainInputAdapter),
    ]
}

/// Run the chain; the first adapter that yields a value wins.
pub async fn read_editor_value(
    channel: &TabChannel,
    object_id: &str,
) -> Result<Option<(EditorKind, String)>> {
    for adapter in detection_chain() {
        match adapter.read_value(channel, object_id).await {
            Ok(Some(value)) => return Ok(Some((adapter.kind(), value))),
            Ok(None) => {}
            Err(Error::Browser(message)) => {
                debug!(editor = adapter.kind().as_str(), %message, "editor value script threw");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}
