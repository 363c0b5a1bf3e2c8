//! Command implementations for the Shearline CLI.

pub mod auth;
pub mod request;
pub mod resource;
pub mod types;

pub use types::{RegisterArgs, ResourceCommand};

use colored::Colorize;
use serde_json::Value;

/// Prints a response body: compact JSON with `--json`, indented otherwise.
pub(crate) fn print_value(value: &Value, json: bool) {
    let rendered = if json {
        value.to_string()
    } else {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    };
    println!("{}", rendered);
}

/// Prints a one-line confirmation, or `{"ok":true,...}` with `--json`.
pub(crate) fn print_done(message: &str, json: bool, extra: Value) {
    if json {
        let mut out = serde_json::json!({ "ok": true });
        if let (Some(out), Value::Object(extra)) = (out.as_object_mut(), extra) {
            out.extend(extra);
        }
        println!("{}", out);
    } else {
        println!("{} {}", "✓".green(), message);
    }
}
