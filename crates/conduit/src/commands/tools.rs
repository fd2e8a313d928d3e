//! Tools command - list the public tool catalog.

use anyhow::Result;
use clap::Args;
use conduit_mcp::CatalogEntry;
use serde_json::json;

use super::Context;
use super::servers;

/// Arguments for the tools command.
#[derive(Args, Debug, Default)]
pub struct ToolsArgs {
    /// Output as JSON (for scripting)
    #[arg(long)]
    pub json: bool,
}

/// Run the tools command: connect, print the catalog, disconnect.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let mut manager = servers::connect(ctx).await?;
    let catalog = manager.router().catalog();
    let servers = manager
        .connected_servers()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    servers::shutdown(&mut manager).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog_json(&catalog))?);
    } else {
        print_table(&servers, &catalog, ctx.verbose);
    }
    Ok(())
}

fn catalog_json(catalog: &[CatalogEntry]) -> serde_json::Value {
    let tools: Vec<_> = catalog
        .iter()
        .map(|entry| {
            json!({
                "name": entry.name,
                "description": entry.description,
                "input_schema": entry.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn print_table(servers: &[String], catalog: &[CatalogEntry], verbose: bool) {
    println!(
        "{} tools from {} servers ({})",
        catalog.len(),
        servers.len(),
        servers.join(", ")
    );
    println!("{}", "-".repeat(80));
    for entry in catalog {
        let description = entry.description.lines().next().unwrap_or("");
        println!("{:<36} {}", entry.name, description);
        if verbose {
            println!("  Schema: {}", entry.input_schema);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_json_shape() {
        let catalog = vec![CatalogEntry {
            name: "web__fetch".to_string(),
            description: "Fetch a URL".to_string(),
            input_schema: json!({"type": "object"}),
        }];
        let value = catalog_json(&catalog);
        assert_eq!(value["tools"][0]["name"], "web__fetch");
        assert_eq!(value["tools"][0]["input_schema"]["type"], "object");
    }
}
