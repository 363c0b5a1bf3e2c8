//! Collection commands: appointments, barbers, services.

use anyhow::Result;
use colored::Colorize;
use serde_json::{json, Value};
use shearline_core::ResourceClient;

use super::types::parse_query;
use super::{print_done, print_value, ResourceCommand};

pub async fn execute(client: &ResourceClient, command: ResourceCommand, json: bool) -> Result<()> {
    match command {
        ResourceCommand::List { query } => {
            let pairs = parse_query(&query)?;
            let borrowed: Vec<(&str, &str)> =
                pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())).collect();
            let items: Value = client.list(&borrowed).await?;

            if !json {
                if let Some(list) = items.as_array() {
                    if list.is_empty() {
                        println!("{}", format!("No items in {}", client.base_path()).yellow());
                        return Ok(());
                    }
                }
            }
            print_value(&items, json);
        }
        ResourceCommand::Get { id } => {
            let item: Value = client.get(&id).await?;
            print_value(&item, json);
        }
        ResourceCommand::Delete { id } => {
            client.delete(&id).await?;
            print_done(&format!("Deleted {}/{}", client.base_path(), id), json, json!({ "id": id }));
        }
    }
    Ok(())
}
