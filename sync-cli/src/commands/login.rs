//! Log in and store the session.

use anyhow::{Context, Result};
use std::path::Path;
use tether_sync_client::{ClientConfig, ClientError, TetherClient};
use tether_sync_types::{AuthError, LoginIdentifier, LoginRequest, SyncError};

use crate::config::StoredSession;

/// Run the login command.
pub async fn run(
    data_dir: &Path,
    config: ClientConfig,
    identifier: LoginIdentifier,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password(&format!("Password for {}: ", identifier.value()))?,
    };

    let client = TetherClient::new(config)?;
    let request = LoginRequest {
        identifier,
        password,
    };

    let response = match client.login(&request).await {
        Ok(response) => response,
        Err(ClientError::Sync(SyncError::Auth(AuthError::LockedOut))) => {
            anyhow::bail!("Too many failed attempts. Try again in a few minutes.")
        }
        Err(ClientError::Sync(SyncError::Auth(_))) => anyhow::bail!("Invalid credentials"),
        Err(e) => return Err(e).context("Login failed"),
    };

    StoredSession::new(&response.token, &response.user.username)
        .save(data_dir)
        .await?;

    println!("Logged in as {} ({})", response.user.username, response.user.role);
    Ok(())
}

/// Prompt for a password with echo suppression.
fn prompt_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    Ok(password)
}
