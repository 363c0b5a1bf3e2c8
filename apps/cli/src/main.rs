//! Shearline CLI - command-line client for the Shearline booking backend
//!
//! This CLI provides a `shear` command that signs in, keeps the session
//! alive, and talks to the backend through the authenticated gateway.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use shearline_core::{Gateway, GatewayConfig, GatewayError, LogoutReason, SessionEvent, ShearlineError};
use tokio::sync::broadcast;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{auth, request, resource, RegisterArgs, ResourceCommand};

/// Exit code used when the session expired and the user must sign in again.
const EXIT_SESSION_EXPIRED: u8 = 2;

/// Shearline CLI - talk to the booking backend from your terminal
#[derive(Parser, Debug)]
#[command(
    name = "shear",
    author,
    version,
    about = "Shearline - authenticated client for the booking backend"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Configuration file (skips ~/.shearline/config.toml and ./.shearlinerc)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config and SHEARLINE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        /// Account email (prompted if omitted)
        #[arg(long)]
        email: Option<String>,

        /// Account password (prompted if omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and sign in with it
    Register(RegisterArgs),

    /// Sign out and forget the stored session
    Logout,

    /// Show who is signed in
    Status,

    /// Send a raw request through the gateway
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,

        /// Path relative to the API base URL, e.g. /appointments
        path: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
    },

    /// Manage appointments
    #[command(subcommand)]
    Appointments(ResourceCommand),

    /// Browse barbers
    #[command(subcommand)]
    Barbers(ResourceCommand),

    /// Browse services
    #[command(subcommand)]
    Services(ResourceCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = load_config(&args)?;
    debug!(api_url = %config.api_url, "Configuration loaded");

    let gateway = Gateway::from_config(&config).context("Failed to initialize gateway")?;
    let mut events = gateway.subscribe();

    match run(args.command, &gateway, &config, args.json).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if session_expired(&e, &mut events) => {
            eprintln!("{} {}", "✗".red(), "Your session has expired.".red().bold());
            eprintln!("  Sign in again with {}", "shear login".cyan());
            Ok(ExitCode::from(EXIT_SESSION_EXPIRED))
        }
        Err(e) => Err(e),
    }
}

/// Resolves configuration: discovered files (or `--config`), then env, then flags.
fn load_config(args: &Args) -> anyhow::Result<GatewayConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = GatewayConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env()?;
            config
        }
        None => GatewayConfig::discover_and_load().context("Failed to load configuration")?,
    };

    if let Some(api_url) = &args.api_url {
        config.api_url.clone_from(api_url);
    }
    config.validate()?;
    Ok(config)
}

async fn run(
    command: Command,
    gateway: &Gateway,
    config: &GatewayConfig,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => auth::login(gateway, email, password, json).await,
        Command::Register(register) => auth::register(gateway, register, json).await,
        Command::Logout => auth::logout(gateway, json).await,
        Command::Status => auth::status(gateway, config, json),
        Command::Request { method, path, data, query } => {
            request::execute(gateway, &method, &path, data.as_deref(), &query, json).await
        }
        Command::Appointments(cmd) => resource::execute(&gateway.appointments(), cmd, json).await,
        Command::Barbers(cmd) => resource::execute(&gateway.barbers(), cmd, json).await,
        Command::Services(cmd) => resource::execute(&gateway.services(), cmd, json).await,
    }
}

/// True if the command failed because the session ended under it.
fn session_expired(error: &anyhow::Error, events: &mut broadcast::Receiver<SessionEvent>) -> bool {
    let mut ended = false;
    while let Ok(event) = events.try_recv() {
        if event == (SessionEvent::LoggedOut { reason: LogoutReason::SessionExpired }) {
            ended = true;
        }
    }

    let expired = error.chain().any(|cause| {
        matches!(cause.downcast_ref::<GatewayError>(), Some(GatewayError::AuthenticationExpired))
            || matches!(
                cause.downcast_ref::<ShearlineError>(),
                Some(ShearlineError::Gateway(GatewayError::AuthenticationExpired))
            )
    });

    ended || expired
}
