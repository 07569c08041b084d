use pagelens_tools::ToolRegistry;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::Session;

enum Line {
    Empty,
    Quit,
    Close,
    Call { tool: String, params: Value },
}

fn parse_line(line: &str) -> Result<Line, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Line::Empty);
    }
    let (tool, rest) = match line.split_once(char::is_whitespace) {
        Some((tool, rest)) => (tool, rest.trim()),
        None => (line, ""),
    };
    match tool {
        "exit" | "quit" => return Ok(Line::Quit),
        "close" => return Ok(Line::Close),
        _ => {}
    }
    let params = if rest.is_empty() {
        json!({})
    } else {
        serde_json::from_str(rest).map_err(|e| format!("invalid JSON params: {}", e))?
    };
    Ok(Line::Call {
        tool: tool.to_string(),
        params,
    })
}

fn error_json(message: String, needs_snapshot: bool) -> Value {
    json!({
        "success": false,
        "error": message,
        "needsSnapshot": needs_snapshot,
    })
}

/// Interactive loop: one `tool_name {json}` per line, one JSON result per line.
pub async fn run(url: Option<&str>) -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults();
    let session = Session::start(url).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let output = match parse_line(&line) {
            Ok(Line::Empty) => continue,
            Ok(Line::Quit) => break,
            Ok(Line::Close) => close_active(&session).await,
            Ok(Line::Call { tool, params }) => {
                match registry.execute(&tool, session.ctx.clone(), params).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(tool = %tool, error = %e, "tool failed");
                        error_json(e.to_string(), e.needs_resnapshot())
                    }
                }
            }
            Err(message) => error_json(message, false),
        };
        println!("{}", output);
    }

    session.shutdown().await;
    Ok(())
}

async fn close_active(session: &Session) -> Value {
    let tab = match session.ctx.backend.active_tab().await {
        Ok(tab) => tab,
        Err(e) => return error_json(e.to_string(), false),
    };
    if let Err(e) = session.browser.close_tab(tab.id).await {
        return error_json(e.to_string(), false);
    }
    session.ctx.manager.clear_tab(tab.id);
    json!({ "success": true, "closed": tab.id })
}
