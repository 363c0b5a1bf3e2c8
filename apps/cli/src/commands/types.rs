//! Command type definitions shared by the subcommands.

use clap::{Args, Subcommand};

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password (prompted if omitted)
    #[arg(long)]
    pub password: Option<String>,

    /// Contact phone number
    #[arg(long)]
    pub phone: Option<String>,

    /// Account role (customer, barber)
    #[arg(long)]
    pub role: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ResourceCommand {
    /// List the collection
    List {
        /// Filter as key=value (repeatable)
        #[arg(short, long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
    },

    /// Show one item
    Get {
        /// Item id
        id: String,
    },

    /// Delete one item
    Delete {
        /// Item id
        id: String,
    },
}

/// Splits `key=value` arguments into query pairs.
pub fn parse_query(pairs: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| anyhow::anyhow!("Invalid query parameter '{}', expected KEY=VALUE", pair))
        })
        .collect()
}
