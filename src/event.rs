use std::io;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::fs::scan::ScannedFile;

/// Result of a background rescan of a folder.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Folder that was scanned.
    pub folder: PathBuf,
    pub result: Result<Vec<ScannedFile>>,
}

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// Playback timer fired; show the next image.
    Tick,
    /// Filesystem change detected by watcher.
    FsChange(Vec<PathBuf>),
    /// Background rescan finished.
    ScanComplete(ScanOutcome),
    /// Ctrl-C was pressed.
    Quit,
}

/// Async event source: a playback timer and Ctrl-C, merged into one channel
/// that other producers (watcher, scan workers) can also feed.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a new EventHandler with the given tick rate. The first tick
    /// fires immediately.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let tick_tx = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_rate);
            loop {
                interval.tick().await;
                if tick_tx.send(Event::Tick).is_err() {
                    break;
                }
            }
        });

        let quit_tx = tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("ctrl-c received");
                let _ = quit_tx.send(Event::Quit);
            }
        });

        Self { rx, tx }
    }

    /// Get a sender clone for the watcher and scan workers.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event (waits until one is available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "event channel closed").into())
    }
}
