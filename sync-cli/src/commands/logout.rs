//! Forget the stored session.

use anyhow::Result;
use std::path::Path;

use crate::config::StoredSession;

/// Run the logout command.
pub async fn run(data_dir: &Path) -> Result<()> {
    if StoredSession::remove(data_dir).await? {
        println!("Logged out.");
    } else {
        println!("No stored session.");
    }
    Ok(())
}
