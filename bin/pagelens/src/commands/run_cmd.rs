use pagelens_tools::ToolRegistry;
use serde_json::Value;

use super::Session;

/// Run a single tool against a freshly launched browser.
pub async fn tool(tool_name: &str, params_json: &str, url: Option<&str>) -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults();

    let tool = registry.get(tool_name)
        .ok_or_else(|| anyhow::anyhow!("Tool '{}' not found. Use `pagelens tools` to see available tools.", tool_name))?;

    let params: Value = serde_json::from_str(params_json)
        .map_err(|e| anyhow::anyhow!("Failed to parse JSON params: {}\nInput: {}", e, params_json))?;

    if let Err(e) = tool.validate(&params) {
        anyhow::bail!("Parameter validation failed: {}\nUse `pagelens tools` for parameter details.", e);
    }

    let session = Session::start(url).await?;
    let result = registry.execute(tool_name, session.ctx.clone(), params).await;
    session.shutdown().await;

    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
