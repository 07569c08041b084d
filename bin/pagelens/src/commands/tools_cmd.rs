use pagelens_tools::ToolRegistry;
use serde_json::Value;

fn schema_function(schema: &Value) -> &Value {
    schema.get("function").unwrap_or(schema)
}

/// List all registered tools.
pub async fn list() -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults();
    let schemas = registry.schemas();

    println!();
    println!("Registered tools ({} total)", schemas.len());
    println!();

    for schema in &schemas {
        let func = schema_function(schema);
        let name = func["name"].as_str().unwrap_or("");
        let desc = func["description"].as_str().unwrap_or("");
        let short_desc: String = desc.chars().take(70).collect();
        let ellipsis = if desc.chars().count() > 70 { "..." } else { "" };
        println!("  {:<26} {}{}", name, short_desc, ellipsis);

        let required: Vec<&str> = func["parameters"]["required"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();
        if let Some(props) = func["parameters"]["properties"].as_object() {
            for (param, spec) in props {
                let marker = if required.contains(&param.as_str()) { "*" } else { " " };
                let kind = spec["type"].as_str().unwrap_or("any");
                println!("  {:<26}   {}{} ({})", "", marker, param, kind);
            }
        }
    }
    println!();

    Ok(())
}
