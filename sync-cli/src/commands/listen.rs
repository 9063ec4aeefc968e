//! Hold the real-time connection and print what arrives.

use anyhow::Result;
use std::path::Path;
use tether_sync_client::{ClientConfig, InboundFrame, TetherClient};
use tether_sync_core::ConnectionState;
use tether_sync_types::Frame;
use tokio_stream::StreamExt;

use crate::config::StoredSession;

/// Run the listen command.
pub async fn run(data_dir: &Path, config: ClientConfig) -> Result<()> {
    let session = StoredSession::require(data_dir).await?;
    let client = TetherClient::new(config)?;
    client.resume_session(session.token);

    println!("Connecting to {}", client.config().server.realtime_url);
    println!("Press Ctrl-C to stop.");
    println!();

    let mut states = client.connection().subscribe_state();
    let mut frames = client.connection().subscribe_frames();
    client.connect();

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            Some(state) = states.next() => {
                println!("[state] {}", state);
                if state.error_reason().is_some() && !client.connection().will_reconnect() {
                    break Err(gave_up(&client.state()));
                }
            }
            Some(frame) = frames.next() => println!("{}", describe(&frame)),
        }
    };

    client.shutdown().await;
    println!("Disconnected.");
    outcome
}

/// Error for a connection that will not retry.
///
/// Takes the latest state rather than the observed one: the bus may hand the
/// loop an earlier `Error` than the terminal one.
fn gave_up(latest: &ConnectionState) -> anyhow::Error {
    let reason = latest.error_reason().unwrap_or("connection closed");
    anyhow::anyhow!("Connection gave up: {}", reason)
}

/// One-line rendering of an inbound frame.
fn describe(inbound: &InboundFrame) -> String {
    match &inbound.frame {
        Frame::Text(text) => format!("[{}] {}", inbound.sequence, text),
        Frame::Binary(data) => format!("[{}] <{} bytes>", inbound.sequence, data.len()),
    }
}
