//! Cluster snapshot source: a JSON document kept up to date by the watching collaborator.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::store::ClusterSnapshot;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Read a snapshot from disk.
pub fn load_snapshot(path: &Path) -> Result<ClusterSnapshot, SnapshotError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Watches the snapshot file and emits each new valid version.
pub struct SnapshotWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ClusterSnapshot>,
}

impl SnapshotWatcher {
    /// Returns the watcher and a receiver for snapshot updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ClusterSnapshot>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            update_tx,
        }, update_rx)
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, SnapshotError> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::debug!(path = ?path, "Snapshot change detected");
                        match load_snapshot(&path) {
                            Ok(snapshot) => {
                                let _ = tx.send(snapshot);
                            }
                            Err(e) => {
                                // Partially written files show up here; the next event retries.
                                tracing::warn!(error = %e, "Failed to load snapshot, keeping the previous one");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Snapshot watcher started");
        Ok(watcher)
    }
}
