//! # tether
//!
//! Command-line client for Tether Sync.
//!
//! ## Commands
//!
//! - `login`: Exchange credentials for a session token
//! - `listen`: Hold the real-time connection and print what arrives
//! - `upload`: Upload files into a remote directory
//! - `status`: Show endpoints and session
//! - `logout`: Forget the stored session
//!
//! ## Example
//!
//! ```bash
//! # Log in (prompts for the password)
//! tether login --username alice
//!
//! # Watch the real-time channel until Ctrl-C
//! tether listen
//!
//! # Upload two files, skipping any that already exist
//! tether upload report.pdf photo.jpg --to /shared/docs --skip-existing
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tether_sync_types::LoginIdentifier;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{listen, login, logout, status, upload};

/// Command-line client for Tether Sync.
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Client configuration file (default: ./tether.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the stored session
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[command(flatten)]
        identity: Identity,

        /// Password (will prompt if not provided)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Connect and print state changes and frames until Ctrl-C
    Listen,

    /// Upload files into a remote directory
    Upload {
        /// Local files to upload, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Remote target directory
        #[arg(long)]
        to: String,

        /// Do not upload files that already exist remotely
        #[arg(long)]
        skip_existing: bool,
    },

    /// Show configuration and session status
    Status,

    /// Delete the stored session
    Logout,
}

/// Exactly one account identifier.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Identity {
    /// Log in by username
    #[arg(long)]
    username: Option<String>,

    /// Log in by email address
    #[arg(long)]
    email: Option<String>,

    /// Log in by phone number
    #[arg(long)]
    phone: Option<String>,
}

impl Identity {
    fn into_identifier(self) -> Option<LoginIdentifier> {
        self.username
            .map(LoginIdentifier::Username)
            .or(self.email.map(LoginIdentifier::Email))
            .or(self.phone.map(LoginIdentifier::Phone))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let client_config = config::load_client_config(cli.config.as_deref())?;

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;

    match cli.command {
        Commands::Login { identity, password } => {
            let identifier = identity
                .into_identifier()
                .context("Specify --username, --email or --phone")?;
            login::run(&data_dir, client_config, identifier, password).await?;
        }
        Commands::Listen => {
            listen::run(&data_dir, client_config).await?;
        }
        Commands::Upload {
            files,
            to,
            skip_existing,
        } => {
            upload::run(&data_dir, client_config, files, &to, skip_existing).await?;
        }
        Commands::Status => {
            status::run(&data_dir, &client_config).await?;
        }
        Commands::Logout => {
            logout::run(&data_dir).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for tether.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "tether", "tether")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
