use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use tokio::sync::mpsc;

use crate::event::Event;
use crate::fs::operations::is_temp_name;
use crate::fs::scan::has_supported_extension;

/// Filesystem watcher that monitors the loaded folder and reports image changes.
pub struct FsWatcher {
    /// Handle to the debouncer (dropped to stop watching).
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

impl FsWatcher {
    /// Create a new FsWatcher that watches `folder` (non-recursive).
    ///
    /// Events are debounced by `debounce_duration` and sent via `event_tx`.
    /// Only paths with one of `extensions` are reported; temporary names
    /// parked by a running batch rename are dropped.
    pub fn new(
        folder: &Path,
        debounce_duration: Duration,
        extensions: Vec<String>,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> notify::Result<Self> {
        let mut debouncer = new_debouncer(
            debounce_duration,
            move |result: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                match result {
                    Ok(events) => {
                        let paths: Vec<PathBuf> = events
                            .iter()
                            .filter(|e| e.kind == DebouncedEventKind::Any)
                            .map(|e| e.path.clone())
                            .filter(|p| is_relevant(p, &extensions))
                            .collect();

                        if paths.is_empty() {
                            return;
                        }
                        debug!("watcher: {} image paths changed", paths.len());
                        let _ = event_tx.send(Event::FsChange(paths));
                    }
                    Err(e) => warn!("file watcher error: {}", e),
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(folder, notify::RecursiveMode::NonRecursive)?;

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

/// Whether a changed path should trigger a rescan.
pub fn is_relevant(path: &Path, extensions: &[String]) -> bool {
    has_supported_extension(path, extensions) && !is_temp_name(path)
}
