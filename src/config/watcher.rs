//! Snapshot file watching using the notify crate for cross-platform
//! support.
//!
//! Implements debouncing to handle rapid file changes (e.g., editors that
//! write multiple times). The parent directory is watched alongside the
//! file itself so atomic rename-into-place saves are seen.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::balance::Balancer;
use crate::config::load_snapshot;

/// Snapshot change event
#[derive(Debug, Clone)]
pub struct SnapshotChangeEvent {
    /// Path to the changed snapshot file
    pub path: PathBuf,

    /// Type of file system event
    pub event_type: EventKind,

    /// Timestamp when event was detected
    pub timestamp: Instant,
}

/// Watcher error type
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Channel send error: {0}")]
    Send(#[from] mpsc::error::SendError<SnapshotChangeEvent>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Snapshot file watcher
pub struct SnapshotWatcher {
    /// Path to the snapshot file
    snapshot_path: PathBuf,

    /// File system watcher instance
    watcher: RecommendedWatcher,

    /// Debounce timer
    debounce: Duration,

    /// Event channel for snapshot changes
    tx: mpsc::Sender<SnapshotChangeEvent>,
}

impl SnapshotWatcher {
    /// Initialize the file watcher with debouncing.
    ///
    /// Must run inside a tokio runtime; the debounce timers are spawned on
    /// it from the notify callback thread.
    pub async fn new(
        snapshot_path: impl AsRef<Path>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<SnapshotChangeEvent>), WatcherError> {
        let snapshot_path = snapshot_path.as_ref().to_path_buf();
        let (tx, rx) = mpsc::channel(10);

        let tx_clone = tx.clone();
        let path_clone = snapshot_path.clone();
        let debounce = Duration::from_millis(debounce_ms);
        let runtime = tokio::runtime::Handle::current();

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if Self::is_relevant_event(&event) {
                        let tx = tx_clone.clone();
                        let path = path_clone.clone();

                        runtime.spawn(async move {
                            tokio::time::sleep(debounce).await;

                            // Re-verify after the debounce window; the file may
                            // have been replaced or removed in the meantime.
                            if path.exists() && path.is_file() {
                                let _ = tx
                                    .send(SnapshotChangeEvent {
                                        path,
                                        event_type: event.kind,
                                        timestamp: Instant::now(),
                                    })
                                    .await;
                            }
                        });
                    }
                }
                Err(e) => {
                    error!("Watcher error: {:?}", e);
                }
            })?;

        watcher.watch(&snapshot_path, RecursiveMode::NonRecursive)?;

        if let Some(parent) = snapshot_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        Ok((
            Self {
                snapshot_path,
                watcher,
                debounce,
                tx,
            },
            rx,
        ))
    }

    /// Determine if an event should trigger a reload
    fn is_relevant_event(event: &Event) -> bool {
        matches!(
            event.kind,
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) | EventKind::Other
        )
    }

    /// Force a snapshot reload (useful for API-triggered reloads)
    pub async fn trigger_reload(&self) -> Result<(), WatcherError> {
        self.tx
            .send(SnapshotChangeEvent {
                path: self.snapshot_path.clone(),
                event_type: EventKind::Other,
                timestamp: Instant::now(),
            })
            .await?;

        Ok(())
    }

    /// Stop watching the snapshot file
    pub fn stop(&mut self) -> Result<(), WatcherError> {
        self.watcher.unwatch(&self.snapshot_path)?;

        if let Some(parent) = self.snapshot_path.parent() {
            self.watcher.unwatch(parent)?;
        }

        Ok(())
    }
}

/// Apply snapshot change events to a balancer.
///
/// Each event re-reads the snapshot file, validates it and reconciles the
/// pool. A file that fails to parse or validate leaves the prior pool
/// active.
pub async fn process_snapshot_changes(
    mut rx: mpsc::Receiver<SnapshotChangeEvent>,
    balancer: Arc<Balancer>,
) {
    // Track last processed event to prevent duplicate processing
    let mut last_processed: Option<Instant> = None;

    while let Some(event) = rx.recv().await {
        if let Some(last) = last_processed {
            if event.timestamp.duration_since(last) < Duration::from_millis(100) {
                continue;
            }
        }

        let applied = load_snapshot(&event.path).and_then(|snapshot| balancer.update(&snapshot));

        match applied {
            Ok(()) => {
                info!(
                    backends = balancer.len(),
                    path = %event.path.display(),
                    "snapshot reloaded"
                );
                last_processed = Some(event.timestamp);

                metrics::counter!("snapshot_reloads_success").increment(1);
            }
            Err(e) => {
                warn!(
                    path = %event.path.display(),
                    "snapshot reload failed, keeping prior pool: {}",
                    e
                );

                metrics::counter!("snapshot_reloads_failed").increment(1);
            }
        }
    }
}
