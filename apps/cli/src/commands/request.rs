//! Raw request command.

use anyhow::{Context, Result};
use serde_json::Value;
use shearline_core::{Gateway, Method, RequestSpec};

use super::print_value;
use super::types::parse_query;

/// Builds a request from command-line parts.
fn build_request(method: &str, path: &str, data: Option<&str>, query: &[String]) -> Result<RequestSpec> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", method))?;

    let mut spec = parse_query(query)?
        .into_iter()
        .fold(RequestSpec::new(method, path), |spec, (key, value)| spec.query(key, value));

    if let Some(data) = data {
        let body: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
        spec = spec.json_value(body);
    }
    Ok(spec)
}

pub async fn execute(
    gateway: &Gateway,
    method: &str,
    path: &str,
    data: Option<&str>,
    query: &[String],
    json: bool,
) -> Result<()> {
    let spec = build_request(method, path, data, query)?;
    let response = gateway.send(spec).await?;

    if response.body.trim().is_empty() {
        if json {
            println!("{}", serde_json::json!({ "status": response.status }));
        }
        return Ok(());
    }

    match serde_json::from_str::<Value>(&response.body) {
        Ok(value) => print_value(&value, json),
        Err(_) => println!("{}", response.body),
    }
    Ok(())
}
