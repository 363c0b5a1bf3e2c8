//! Session commands: login, register, logout and status.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use rpassword::read_password;
use serde_json::json;
use shearline_core::{
    Gateway, GatewayConfig, GatewayError, RegisterRequest, ShearlineError, UserRole, UserSummary,
};

use super::{print_done, RegisterArgs};

fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let password = read_password()?;
    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(password)
}

fn parse_role(role: &str) -> Result<UserRole> {
    match role.to_ascii_lowercase().as_str() {
        "customer" => Ok(UserRole::Customer),
        "barber" => Ok(UserRole::Barber),
        other => Err(anyhow!("Unknown role '{}' (expected customer or barber)", other)),
    }
}

/// A 401 on login or register means bad credentials, not an expired session.
fn rejected_credentials(error: ShearlineError) -> anyhow::Error {
    match error {
        ShearlineError::Gateway(GatewayError::AuthenticationExpired) => {
            anyhow!("Invalid email or password")
        }
        other => other.into(),
    }
}

fn print_signed_in(user: &UserSummary, json: bool) {
    let label = if user.name.is_empty() { user.email.as_str() } else { user.name.as_str() };
    print_done(
        &format!("Logged in as {} ({})", label.bold(), user.role),
        json,
        json!({ "user": user }),
    );
}

/// Signs in, prompting for whatever was not passed as a flag.
pub async fn login(
    gateway: &Gateway,
    email: Option<String>,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt_line("Email")?,
    };
    if email.is_empty() {
        bail!("Email cannot be empty");
    }
    let password = match password {
        Some(password) => password,
        None => prompt_password()?,
    };

    let user = gateway.login(&email, &password).await.map_err(rejected_credentials)?;
    print_signed_in(&user, json);
    Ok(())
}

/// Creates an account and signs in with it.
pub async fn register(gateway: &Gateway, args: RegisterArgs, json: bool) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => prompt_password()?,
    };
    let role = args.role.as_deref().map(parse_role).transpose()?;

    let request = RegisterRequest {
        name: args.name,
        email: args.email,
        password,
        phone: args.phone,
        role,
    };
    let user = gateway.register(&request).await.map_err(rejected_credentials)?;
    print_signed_in(&user, json);
    Ok(())
}

pub async fn logout(gateway: &Gateway, json: bool) -> Result<()> {
    let was_active = gateway.logout().await;
    let message = if was_active { "Logged out" } else { "Not logged in; nothing to do" };
    print_done(message, json, json!({ "was_logged_in": was_active }));
    Ok(())
}

/// Shows the signed-in user and which tokens are stored. Never prints a token.
pub fn status(gateway: &Gateway, config: &GatewayConfig, json: bool) -> Result<()> {
    let store = gateway.store();
    let user = gateway.current_user()?;
    let authenticated = gateway.is_authenticated();
    let has_refresh_token = store.refresh_token()?.is_some();

    if json {
        let status = json!({
            "authenticated": authenticated,
            "refresh_token": has_refresh_token,
            "user": user,
            "api_url": config.api_url,
        });
        println!("{}", status);
        return Ok(());
    }

    println!("{}", "Shearline Status".bold().cyan());
    println!();
    println!("  API: {}", config.api_url.dimmed());

    if !authenticated {
        println!("  Session: {}", "Not logged in".yellow());
        println!();
        println!("  Use {} to sign in", "shear login".cyan());
        return Ok(());
    }

    println!("  Session: {}", "Active".green());
    if let Some(user) = user {
        println!("  User: {} <{}>", user.name.bold(), user.email);
        println!("  Role: {}", user.role);
    }
    let refresh = if has_refresh_token { "stored".green() } else { "missing".yellow() };
    println!("  Refresh token: {}", refresh);
    Ok(())
}
