//! Upload files into a remote directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tether_sync_client::{
    ClientConfig, ClientError, ConflictPolicy, TetherClient, TransferEvent,
};
use tether_sync_core::{BatchReport, FileSource, JobStatus};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::StoredSession;

/// Run the upload command.
pub async fn run(
    data_dir: &Path,
    mut config: ClientConfig,
    files: Vec<PathBuf>,
    target: &str,
    skip_existing: bool,
) -> Result<()> {
    let session = StoredSession::require(data_dir).await?;
    let sources = collect_sources(&files).await?;

    if skip_existing {
        config.transfer.conflict_policy = ConflictPolicy::Skip;
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let client = TetherClient::new(config)?.with_transfer_events(tx);
    client.resume_session(session.token);

    let names: Vec<String> = sources.iter().map(|s| s.name.clone()).collect();
    let printer = tokio::spawn(print_events(rx, names));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current file...");
            on_interrupt.cancel();
        }
    });

    println!("Uploading {} file(s) to {}", sources.len(), target);
    let result = client.upload(sources, target, &cancel).await;
    // The coordinator holds the only sender; dropping it ends the printer.
    drop(client);
    let _ = printer.await;

    let report = match result {
        Ok(report) => report,
        Err(ClientError::Batch(aborted)) => {
            if let Some(report) = aborted.report() {
                print_summary(report);
            }
            return Err(aborted).context("Session rejected. Run 'tether login' again.");
        }
        Err(e) => return Err(e).context("Upload failed"),
    };

    print_summary(&report);
    if !report.result.is_success() {
        anyhow::bail!("{}", report.result);
    }
    Ok(())
}

/// Resolve local paths into sources with their sizes.
async fn collect_sources(files: &[PathBuf]) -> Result<Vec<FileSource>> {
    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot read {}", path.display()))?;
        if !metadata.is_file() {
            anyhow::bail!("{} is not a regular file", path.display());
        }
        sources.push(FileSource::new(path, metadata.len()));
    }
    Ok(sources)
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<TransferEvent>, names: Vec<String>) {
    while let Some(event) = rx.recv().await {
        match event {
            TransferEvent::JobStarted { index, name, .. } => {
                println!("[{}/{}] {}", index + 1, names.len(), name);
            }
            TransferEvent::JobProgress { fraction, .. } => {
                tracing::debug!("progress {:.0}%", fraction * 100.0);
            }
            TransferEvent::JobFinished { status, .. } => println!("  {}", describe(&status)),
            TransferEvent::BatchProgress { .. } => {}
        }
    }
}

fn describe(status: &JobStatus) -> String {
    match status {
        JobStatus::Completed => "done".to_string(),
        JobStatus::Failed(reason) => format!("failed: {}", reason),
        JobStatus::Cancelled => "cancelled".to_string(),
        JobStatus::Waiting | JobStatus::Transferring => "pending".to_string(),
    }
}

fn print_summary(report: &BatchReport) {
    println!();
    println!("{}", report.result);
    if report.cancelled > 0 {
        println!("{} file(s) not started", report.cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tether_sync_types::{FileError, SyncError};

    #[tokio::test]
    async fn collects_sizes_in_order() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"hello").unwrap();
        std::fs::write(&b, vec![0u8; 1024]).unwrap();

        let sources = collect_sources(&[a, b]).await.unwrap();
        assert_eq!(sources[0].name, "a.txt");
        assert_eq!(sources[0].size, 5);
        assert_eq!(sources[1].name, "b.bin");
        assert_eq!(sources[1].size, 1024);
    }

    #[tokio::test]
    async fn missing_file_is_rejected_up_front() {
        let dir = tempdir().unwrap();
        let err = collect_sources(&[dir.path().join("nope.txt")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nope.txt"));
    }

    #[tokio::test]
    async fn directory_is_rejected() {
        let dir = tempdir().unwrap();
        let err = collect_sources(&[dir.path().to_path_buf()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[tokio::test]
    async fn upload_requires_session() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();

        let err = run(dir.path(), ClientConfig::default(), vec![file], "/docs", false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tether login"));
    }

    #[test]
    fn statuses_render() {
        assert_eq!(describe(&JobStatus::Completed), "done");
        assert_eq!(
            describe(&JobStatus::Failed(SyncError::File(FileError::Exists))),
            "failed: file error: file already exists"
        );
        assert_eq!(describe(&JobStatus::Cancelled), "cancelled");
    }
}
