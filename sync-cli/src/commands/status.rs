//! Show configuration and session status.

use anyhow::Result;
use std::path::Path;
use tether_sync_client::ClientConfig;

use crate::config::StoredSession;

/// Run the status command.
pub async fn run(data_dir: &Path, config: &ClientConfig) -> Result<()> {
    println!("=== tether status ===");
    println!();

    println!("Server:");
    println!("  Real-time: {}", config.server.realtime_url);
    println!("  API:       {}", config.server.api_base);
    println!(
        "  Reconnect: up to {} attempts, {} ms base delay",
        config.connection.max_reconnect_attempts, config.connection.reconnect_base_ms
    );
    println!();

    match StoredSession::load(data_dir).await? {
        Some(session) => {
            println!("Session:");
            println!("  User:      {}", session.username);
            println!("  Logged in: {}", format_timestamp(session.saved_at));
        }
        None => {
            println!("Session: NOT LOGGED IN");
            println!();
            println!("Run 'tether login --username <name>' to log in.");
        }
    }

    Ok(())
}

/// Format a Unix timestamp as a human-readable string.
fn format_timestamp(ts: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let diff = now.saturating_sub(ts);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn status_without_session() {
        let dir = tempdir().unwrap();
        let result = run(dir.path(), &ClientConfig::default()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn status_with_session() {
        let dir = tempdir().unwrap();
        StoredSession::new("tok", "alice")
            .save(dir.path())
            .await
            .unwrap();

        let result = run(dir.path(), &ClientConfig::default()).await;
        assert!(result.is_ok());
    }

    #[test]
    fn format_timestamp_works() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();

        assert_eq!(format_timestamp(now), "just now");
        assert!(format_timestamp(now - 120).contains("minutes"));
        assert!(format_timestamp(now - 7200).contains("hours"));
        assert!(format_timestamp(now - 172800).contains("days"));
    }
}
