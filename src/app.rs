use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::collection::{CollectionStore, EntryId, LoadStatus};
use crate::error::{AppError, Result};
use crate::event::{Event, ScanOutcome};
use crate::fs::scan::scan_directory;
use crate::ordering::{build_view, View, ViewSpec};
use crate::rename::{self, RenameExecutor, RenameParams, RenamePlan, RenameReport};
use crate::sequencer::RandomSequencer;
use crate::session::{Session, SessionStore};

/// How the next image is chosen.
pub enum Playback {
    /// Walk the view in order, wrapping at the end.
    Sequential { view: View, position: Option<usize> },
    /// Non-repeating random cycles over the view.
    Random(RandomSequencer),
}

impl Playback {
    pub fn is_random(&self) -> bool {
        matches!(self, Playback::Random(_))
    }
}

/// Main application state.
///
/// Single owner of the collection store, the playback cursor and the session,
/// so renames and rescans never interleave with serving an image.
pub struct App {
    store: CollectionStore,
    spec: ViewSpec,
    playback: Playback,
    seed: Option<u64>,
    current: Option<EntryId>,
    session: Session,
    session_store: Option<SessionStore>,
    /// Stop after this many images.
    limit: Option<usize>,
    shown: usize,
    scan_pending: bool,
    rescan_queued: bool,
    pub should_quit: bool,
}

impl App {
    /// Create an app with no folder loaded, restoring the session if a
    /// session store is given.
    pub fn new(extensions: Vec<String>, session_store: Option<SessionStore>) -> Self {
        let session = session_store
            .as_ref()
            .map(SessionStore::load)
            .unwrap_or_default();
        Self {
            store: CollectionStore::new(extensions),
            spec: ViewSpec::default(),
            playback: Playback::Sequential {
                view: build_view(&Default::default(), &ViewSpec::default()),
                position: None,
            },
            seed: None,
            current: None,
            session,
            session_store,
            limit: None,
            shown: 0,
            scan_pending: false,
            rescan_queued: false,
            should_quit: false,
        }
    }

    /// Seed random playback for a reproducible order.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Quit after `limit` images have been shown.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    /// Loaded folder, if any.
    pub fn folder(&self) -> Option<&Path> {
        self.store.collection().folder()
    }

    /// The view of the current collection under the active spec.
    pub fn view(&self) -> View {
        build_view(self.store.collection(), &self.spec)
    }

    /// Load `folder` and start playback over it.
    pub fn open_folder(&mut self, folder: &Path, spec: ViewSpec, random: bool) -> Result<LoadStatus> {
        let status = self.store.load(folder)?;
        let loaded = self
            .store
            .collection()
            .folder()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| folder.to_path_buf());

        if let Some(store) = &self.session_store {
            store.touch_recent_folder(&mut self.session, &loaded);
        }
        self.session.last_keyword = spec.keyword_filter.clone();
        self.session.last_sort_spec = spec.clone();
        self.session.random_mode_enabled = random;

        self.spec = spec;
        self.current = None;
        self.playback = if random {
            Playback::Random(self.new_sequencer())
        } else {
            Playback::Sequential {
                view: self.view(),
                position: None,
            }
        };
        self.restart_playback();
        self.persist();
        Ok(status)
    }

    /// Switch between random and sequential playback.
    pub fn set_random(&mut self, random: bool) {
        if self.playback.is_random() == random {
            return;
        }
        self.playback = if random {
            Playback::Random(self.new_sequencer())
        } else {
            Playback::Sequential {
                view: self.view(),
                position: None,
            }
        };
        self.session.random_mode_enabled = random;
        self.restart_playback();
        self.persist();
    }

    fn new_sequencer(&self) -> RandomSequencer {
        match self.seed {
            Some(seed) => RandomSequencer::seeded(seed),
            None => RandomSequencer::new(),
        }
    }

    /// Recompute playback against the current collection generation.
    ///
    /// Sequential playback keeps its place on the current image if it is
    /// still in the view. Random playback starts a fresh cycle.
    fn restart_playback(&mut self) {
        let view = self.view();
        match &mut self.playback {
            Playback::Sequential {
                view: current_view,
                position,
            } => {
                *position = self.current.and_then(|id| view.position(id));
                *current_view = view;
            }
            Playback::Random(sequencer) => {
                sequencer.start(self.store.collection(), self.spec.clone());
            }
        }
        debug!(
            "playback restarted at generation {}",
            self.store.generation()
        );
    }

    /// Pick the next image. `None` means the view is empty, which is not an
    /// error: playback idles until the folder changes.
    pub fn advance(&mut self) -> Result<Option<PathBuf>> {
        let id = match self.next_id() {
            Ok(id) => id,
            Err(AppError::StaleGeneration { .. }) => {
                self.restart_playback();
                self.next_id()?
            }
            Err(e) => return Err(e),
        };
        let Some(id) = id else {
            return Ok(None);
        };

        let path = self
            .store
            .collection()
            .get(id)
            .map(|entry| entry.path().to_path_buf())
            .ok_or_else(|| AppError::NotFoundInCollection(PathBuf::from(id.to_string())))?;

        self.current = Some(id);
        self.session.last_open_path = Some(path.clone());
        self.shown += 1;
        if self.limit.is_some_and(|limit| self.shown >= limit) {
            self.should_quit = true;
        }
        Ok(Some(path))
    }

    fn next_id(&mut self) -> Result<Option<EntryId>> {
        let collection = self.store.collection();
        match &mut self.playback {
            Playback::Sequential { view, position } => {
                if !view.is_current(collection) {
                    return Err(AppError::StaleGeneration {
                        expected: view.generation(),
                        actual: collection.generation(),
                    });
                }
                if view.is_empty() {
                    return Ok(None);
                }
                let next = position.map_or(0, |p| (p + 1) % view.len());
                *position = Some(next);
                Ok(Some(view.ids()[next]))
            }
            Playback::Random(sequencer) => match sequencer.next(collection) {
                Ok(id) => Ok(Some(id)),
                Err(AppError::EmptyView) => Ok(None),
                Err(e) => Err(e),
            },
        }
    }

    /// React to watcher events by rescanning the folder on a blocking worker.
    pub fn handle_fs_change(&mut self, paths: Vec<PathBuf>, event_tx: &mpsc::UnboundedSender<Event>) {
        debug!("{} watched paths changed", paths.len());
        if self.scan_pending {
            self.rescan_queued = true;
            return;
        }
        self.spawn_scan(event_tx);
    }

    fn spawn_scan(&mut self, event_tx: &mpsc::UnboundedSender<Event>) {
        let Some(folder) = self.folder().map(Path::to_path_buf) else {
            return;
        };
        let extensions = self.store.extensions().to_vec();
        let tx = event_tx.clone();
        self.scan_pending = true;
        tokio::task::spawn_blocking(move || {
            let result = scan_directory(&folder, &extensions);
            let _ = tx.send(Event::ScanComplete(ScanOutcome { folder, result }));
        });
    }

    /// Publish a finished background scan and restart playback if the
    /// collection changed.
    pub fn handle_scan_complete(&mut self, outcome: ScanOutcome, event_tx: &mpsc::UnboundedSender<Event>) {
        self.scan_pending = false;

        if self.folder() != Some(outcome.folder.as_path()) {
            debug!("dropping scan of {}", outcome.folder.display());
        } else {
            match outcome.result {
                Ok(scanned) => {
                    let summary = self.store.publish_scan(outcome.folder, scanned);
                    if !summary.is_unchanged() {
                        info!(
                            "folder changed: {} added, {} removed, {} updated",
                            summary.added, summary.removed, summary.updated
                        );
                        self.restart_playback();
                    }
                }
                Err(e) => warn!("rescan of {} failed: {}", outcome.folder.display(), e),
            }
        }

        if std::mem::take(&mut self.rescan_queued) {
            self.spawn_scan(event_tx);
        }
    }

    /// Plan a batch rename over the current view.
    pub fn plan_rename(&self, params: &RenameParams) -> Result<RenamePlan> {
        let view = self.view();
        rename::plan(self.store.collection(), view.ids(), params)
    }

    /// Execute a rename plan and restart playback over the new names.
    pub fn execute_rename(&mut self, plan: &RenamePlan, cancel: &AtomicBool) -> Result<RenameReport> {
        let result = RenameExecutor::new().execute(plan, &mut self.store, cancel);
        if let Ok(report) = &result {
            if let Some(folder) = self.folder().map(Path::to_path_buf) {
                self.session.batch_path = Some(folder);
                self.persist();
            }
            info!(
                "rename: {} renamed, {} failed{}",
                report.succeeded.len(),
                report.failed.len(),
                if report.rolled_back { ", rolled back" } else { "" }
            );
            self.restart_playback();
        }
        result
    }

    /// Write the session document, if sessions are enabled.
    pub fn save_session(&self) -> Result<()> {
        match &self.session_store {
            Some(store) => store.save(&self.session),
            None => Ok(()),
        }
    }

    /// Save after a change to persisted state. Failures are logged and
    /// retried by the save at shutdown.
    fn persist(&self) {
        if let Err(e) = self.save_session() {
            warn!("could not save session: {}", e);
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}
