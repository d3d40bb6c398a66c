//! Polling watch subscription over the source directory

use crate::core::resource::discover_resources;
use crate::execution::cancel::CancellationFlag;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A changed resource path, relative to the watched directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChange {
    pub path: String,
    pub kind: ChangeKind,
}

type Snapshot = HashMap<String, (Option<SystemTime>, u64)>;

/// Reports batches of resource changes until cancelled
#[derive(Debug)]
pub struct WatchSubscription {
    root: PathBuf,
    skip: Vec<PathBuf>,
    interval: Duration,
    cancel: CancellationFlag,
    snapshot: Snapshot,
}

impl WatchSubscription {
    /// Start watching `root`; the current state is the baseline
    pub async fn start(
        root: impl Into<PathBuf>,
        skip: Vec<PathBuf>,
        interval: Duration,
        cancel: CancellationFlag,
    ) -> std::io::Result<Self> {
        let root = root.into();
        let snapshot = take_snapshot(root.clone(), skip.clone()).await?;
        debug!(dir = %root.display(), files = snapshot.len(), "Watching for changes");
        Ok(Self {
            root,
            skip,
            interval,
            cancel,
            snapshot,
        })
    }

    /// Wait for the next batch of changes, sorted by path.
    ///
    /// Changes are relative to the previous batch, so edits made while the
    /// caller is busy are reported by the following call. Returns `None`
    /// once the subscription is cancelled.
    pub async fn next(&mut self) -> Option<Vec<ResourceChange>> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let current = match take_snapshot(self.root.clone(), self.skip.clone()).await {
                Ok(current) => current,
                Err(e) => {
                    warn!(dir = %self.root.display(), error = %e, "Failed to scan watched directory");
                    continue;
                }
            };

            let changes = diff(&self.snapshot, &current);
            self.snapshot = current;
            if !changes.is_empty() {
                return Some(changes);
            }
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

async fn take_snapshot(root: PathBuf, skip: Vec<PathBuf>) -> std::io::Result<Snapshot> {
    tokio::task::spawn_blocking(move || {
        let mut snapshot = Snapshot::new();
        for resource in discover_resources(&root, &skip)? {
            let Some(file) = resource.file_path() else {
                continue;
            };
            // Files removed mid-scan show up as removed on the next poll
            if let Ok(meta) = std::fs::metadata(file) {
                snapshot.insert(resource.path, (meta.modified().ok(), meta.len()));
            }
        }
        Ok(snapshot)
    })
    .await
    .map_err(std::io::Error::other)?
}

fn diff(before: &Snapshot, after: &Snapshot) -> Vec<ResourceChange> {
    let mut changes = BTreeMap::new();

    for (path, stamp) in after {
        match before.get(path) {
            None => {
                changes.insert(path.clone(), ChangeKind::Added);
            }
            Some(old) if old != stamp => {
                changes.insert(path.clone(), ChangeKind::Modified);
            }
            Some(_) => {}
        }
    }
    for path in before.keys() {
        if !after.contains_key(path) {
            changes.insert(path.clone(), ChangeKind::Removed);
        }
    }

    changes
        .into_iter()
        .map(|(path, kind)| ResourceChange { path, kind })
        .collect()
}
