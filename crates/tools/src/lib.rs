pub mod browser;
pub mod registry;

use async_trait::async_trait;
use pagelens_core::{Config, Result};
use serde_json::Value;
use std::sync::Arc;

use browser::{PageBackend, SnapshotManager};

pub use registry::ToolRegistry;

/// Longest prefix of `s` holding at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => &s[..cut],
        None => s,
    }
}

/// Everything a tool invocation may touch.
#[derive(Clone)]
pub struct ToolContext {
    pub config: Config,
    pub manager: Arc<SnapshotManager>,
    pub backend: Arc<dyn PageBackend>,
}

impl ToolContext {
    pub fn new(config: Config, backend: Arc<dyn PageBackend>) -> Self {
        let manager = Arc::new(SnapshotManager::with_backend(backend.clone(), &config));
        Self {
            config,
            manager,
            backend,
        }
    }
}

pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;
    fn validate(&self, params: &Value) -> Result<()>;
    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value>;
}
