use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use pagelens_core::{Error, Result};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::browser::tool::{
    ClickElementTool, FillElementTool, GetEditorValueTool, GetPageContentTool, GetPageInfoTool,
    HoverElementTool, NavigateTool, ScrollPageTool, SearchSnapshotTool, TakeSnapshotTool,
};
use crate::{Tool, ToolContext};

/// Name-indexed set of tools. Iteration order is the name order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the page tools.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let tools: [Arc<dyn Tool>; 10] = [
            Arc::new(TakeSnapshotTool),
            Arc::new(SearchSnapshotTool),
            Arc::new(GetPageInfoTool),
            Arc::new(GetPageContentTool),
            Arc::new(NavigateTool),
            Arc::new(ScrollPageTool),
            Arc::new(ClickElementTool),
            Arc::new(FillElementTool),
            Arc::new(HoverElementTool),
            Arc::new(GetEditorValueTool),
        ];
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Add a tool, replacing any tool already registered under its name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        if self.tools.insert(name, tool).is_some() {
            warn!(tool = name, "replaced previously registered tool");
        } else {
            debug!(tool = name, "registered tool");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    /// Function-calling schemas for every tool, in name order.
    pub fn schemas(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                let schema = tool.schema();
                json!({
                    "type": "function",
                    "function": {
                        "name": schema.name,
                        "description": schema.description,
                        "parameters": schema.parameters,
                    }
                })
            })
            .collect()
    }

    /// Validate `params` and run the named tool.
    pub async fn execute(&self, name: &str, ctx: ToolContext, params: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::Tool(format!("Unknown tool: {}", name)))?;
        tool.validate(&params)?;

        let started = Instant::now();
        let result = tool.execute(ctx, params).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(tool = name, elapsed_ms, "tool finished"),
            Err(e) if e.needs_resnapshot() => {
                info!(tool = name, elapsed_ms, error = %e, "tool needs a fresh snapshot")
            }
            Err(e) => warn!(tool = name, elapsed_ms, error = %e, "tool failed"),
        }
        result
    }
}
