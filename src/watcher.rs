//! Folder-watch collaborator.
//!
//! Surfaces newly created file paths from a watched directory as a FIFO
//! stream. Best effort only: no rename/delete semantics, and duplicate
//! filtering is left to the consumer.

use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::errors::{AppError, Result};

#[derive(Debug)]
pub struct FolderWatcher {
    // Dropping the watcher stops observation.
    _watcher: notify::RecommendedWatcher,
    rx: UnboundedReceiver<PathBuf>,
}

impl FolderWatcher {
    /// Watch `dir` (non-recursively) for newly created files.
    pub fn watch(dir: &Path) -> Result<Self> {
        let (tx, rx) = unbounded_channel();

        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Create(_)) {
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
            }
            Err(e) => log::warn!("Watch error: {}", e),
        })
        .map_err(|e| AppError::Watch(e.to_string()))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| AppError::Watch(e.to_string()))?;
        log::info!("Watching folder: {}", dir.display());

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Next created path, in arrival order. None once watching has stopped.
    pub async fn next_created(&mut self) -> Option<PathBuf> {
        self.rx.recv().await
    }
}
