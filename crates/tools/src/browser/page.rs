//! Whole-page operations that are not tied to a snapshot UID.

use pagelens_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::channel::TabChannel;

/// Tried in order when no specific selector is requested.
pub const CONTENT_CANDIDATES: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "#content",
    "#main",
    ".main-content",
    "body",
];

/// Longer page text is cut to this many characters.
pub const MAX_CONTENT_CHARS: usize = 25_000;

pub const DEFAULT_SCROLL_PIXELS: u64 = 500;

pub(crate) const SCROLL_FN: &str = r#"function(direction, pixels) {
  const root = document.scrollingElement || document.documentElement;
  switch (direction) {
    case 'up': window.scrollBy({ top: -pixels, behavior: 'instant' }); break;
    case 'down': window.scrollBy({ top: pixels, behavior: 'instant' }); break;
    case 'top': window.scrollTo({ top: 0, behavior: 'instant' }); break;
    case 'bottom': window.scrollTo({ top: root.scrollHeight, behavior: 'instant' }); break;
  }
  return { scrollY: window.scrollY, scrollHeight: root.scrollHeight, viewportHeight: window.innerHeight };
}"#;

pub(crate) const PAGE_CONTENT_FN: &str = r#"function(selector, candidates) {
  let element = null;
  let used = selector;
  if (!selector || selector === 'body') {
    for (const candidate of candidates) {
      const found = document.querySelector(candidate);
      if (found) { element = found; used = candidate; break; }
    }
  } else {
    try { element = document.querySelector(selector); }
    catch (e) { return { invalid: String(e && e.message || e) }; }
  }
  if (!element) return null;
  return { content: element.innerText || element.textContent || '', selector: used };
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

impl ScrollDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }

    /// Whether `pixels` applies (relative scroll).
    pub fn is_relative(&self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }
}

/// Viewport position after a scroll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollPosition {
    pub scroll_y: f64,
    pub scroll_height: f64,
    pub viewport_height: f64,
}

impl ScrollPosition {
    pub fn at_bottom(&self) -> bool {
        self.scroll_y + self.viewport_height >= self.scroll_height - 1.0
    }
}

pub async fn scroll(channel: &TabChannel, direction: ScrollDirection, pixels: u64) -> Result<ScrollPosition> {
    let value = channel
        .call_in_page(SCROLL_FN, &[json!(direction.as_str()), json!(pixels)])
        .await?;
    serde_json::from_value(value)
        .map_err(|e| Error::Browser(format!("unexpected scroll result: {}", e)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    /// The selector that actually matched.
    pub selector: String,
    pub content: String,
    pub is_truncated: bool,
    /// Length in characters before truncation.
    pub total_length: usize,
}

/// Visible text of `selector`, or of the first main-content candidate when
/// no selector (or `body`) is given.
pub async fn read_content(channel: &TabChannel, selector: Option<&str>) -> Result<PageContent> {
    let selector = selector
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("body");
    let value = channel
        .call_in_page(PAGE_CONTENT_FN, &[json!(selector), json!(CONTENT_CANDIDATES)])
        .await?;

    if let Some(reason) = value.get("invalid").and_then(|v| v.as_str()) {
        return Err(Error::Validation(format!("invalid selector '{}': {}", selector, reason)));
    }
    let text = value
        .get("content")
        .and_then(|v| v.as_str())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::NotFound(format!("No content found for selector: {}", selector)))?;
    let used = value
        .get("selector")
        .and_then(|v| v.as_str())
        .unwrap_or(selector)
        .to_string();
    Ok(truncate_content(used, text))
}

fn truncate_content(selector: String, text: &str) -> PageContent {
    let total_length = text.chars().count();
    let is_truncated = total_length > MAX_CONTENT_CHARS;
    let content = if is_truncated {
        format!(
            "{}\n\n[Content truncated at {} of {} characters. Pass a narrower selector to read a specific part.]",
            crate::truncate_chars(text, MAX_CONTENT_CHARS),
            MAX_CONTENT_CHARS,
            total_length
        )
    } else {
        text.to_string()
    };
    PageContent {
        selector,
        content,
        is_truncated,
        total_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::test_support::{FakePage, FAKE_TAB};
    use std::sync::Arc;
    use std::time::Duration;

    fn channel(page: &Arc<FakePage>) -> TabChannel {
        TabChannel::new(page.clone(), FAKE_TAB, Duration::from_secs(1))
    }

    #[test]
    fn test_parse_direction() {
        assert_eq!(ScrollDirection::parse("Down"), Some(ScrollDirection::Down));
        assert_eq!(ScrollDirection::parse("bottom"), Some(ScrollDirection::Bottom));
        assert_eq!(ScrollDirection::parse("sideways"), None);
        assert!(ScrollDirection::Up.is_relative());
        assert!(!ScrollDirection::Top.is_relative());
    }

    #[tokio::test]
    async fn test_scroll_moves_and_clamps() {
        let page = Arc::new(FakePage::new("https://example.com/article"));
        let channel = channel(&page);

        let pos = scroll(&channel, ScrollDirection::Down, 500).await.unwrap();
        assert_eq!(pos.scroll_y, 500.0);
        let pos = scroll(&channel, ScrollDirection::Up, 2000).await.unwrap();
        assert_eq!(pos.scroll_y, 0.0);
        let pos = scroll(&channel, ScrollDirection::Bottom, 0).await.unwrap();
        assert!(pos.at_bottom());
        let pos = scroll(&channel, ScrollDirection::Top, 0).await.unwrap();
        assert_eq!(pos.scroll_y, 0.0);
        // The document handle is released every time.
        assert_eq!(page.release_count(), 4);
    }

    #[tokio::test]
    async fn test_content_prefers_main_candidates() {
        let page = Arc::new(FakePage::new("https://example.com/article"));
        page.set_content("body", "Nav Home About\nStory text");
        page.set_content("main", "Story text");
        let content = read_content(&channel(&page), None).await.unwrap();
        assert_eq!(content.selector, "main");
        assert_eq!(content.content, "Story text");
        assert!(!content.is_truncated);
        assert_eq!(content.total_length, 10);

        page.set_content("article", "Lead paragraph");
        let content = read_content(&channel(&page), Some("body")).await.unwrap();
        assert_eq!(content.selector, "article");
    }

    #[tokio::test]
    async fn test_content_explicit_selector() {
        let page = Arc::new(FakePage::new("https://example.com/article"));
        page.set_content("body", "Everything");
        page.set_content("#comments", "First!");
        let content = read_content(&channel(&page), Some(" #comments ")).await.unwrap();
        assert_eq!(content.selector, "#comments");
        assert_eq!(content.content, "First!");

        let err = read_content(&channel(&page), Some("#missing")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(err.to_string().contains("#missing"));
    }

    #[test]
    fn test_long_content_is_truncated() {
        let text = "é".repeat(MAX_CONTENT_CHARS + 10);
        let content = truncate_content("main".into(), &text);
        assert!(content.is_truncated);
        assert_eq!(content.total_length, MAX_CONTENT_CHARS + 10);
        assert!(content.content.starts_with(&"é".repeat(MAX_CONTENT_CHARS)));
        assert!(content.content.contains("[Content truncated"));

        let short = truncate_content("main".into(), "short");
        assert!(!short.is_truncated);
        assert_eq!(short.content, "short");
    }
}
