use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use crate::collection::entry::normalize_keyword;
use crate::collection::{Collection, Entry, EntryId};
use crate::error::{AppError, Result};
use crate::fs::scan::{scan_directory, ScannedFile};

/// Outcome of [`CollectionStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The folder holds this many images.
    Loaded(usize),
    /// The folder exists but holds no supported image. Not an error.
    Empty,
}

/// What a refresh changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub added: usize,
    pub removed: usize,
    /// Kept entries whose size or timestamp changed.
    pub updated: usize,
}

impl RefreshSummary {
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.updated == 0
    }
}

/// Owner of the current [`Collection`].
///
/// The collection sits behind an `Arc`: readers take a [`snapshot`] that
/// stays valid and unchanged while the store swaps in a new version.
///
/// [`snapshot`]: CollectionStore::snapshot
pub struct CollectionStore {
    current: Arc<Collection>,
    extensions: Vec<String>,
    next_id: u64,
}

impl CollectionStore {
    /// Create an empty store scanning for the given lower-cased extensions.
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            current: Arc::new(Collection::default()),
            extensions,
            next_id: 0,
        }
    }

    /// Extension allow-list used by scans.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Consistent read-only view of the current collection.
    pub fn snapshot(&self) -> Arc<Collection> {
        Arc::clone(&self.current)
    }

    /// Borrow the current collection.
    pub fn collection(&self) -> &Collection {
        &self.current
    }

    pub fn generation(&self) -> u64 {
        self.current.generation
    }

    /// Scan `folder` and replace the current collection with its images.
    pub fn load(&mut self, folder: &Path) -> Result<LoadStatus> {
        let folder = folder
            .canonicalize()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => AppError::NotFound(folder.to_path_buf()),
                _ => AppError::Io(e),
            })?;
        let scanned = scan_directory(&folder, &self.extensions)?;
        Ok(self.replace(folder, scanned))
    }

    /// Re-scan the loaded folder, keeping ids and keywords of surviving entries.
    pub fn refresh(&mut self) -> Result<RefreshSummary> {
        let folder = self
            .current
            .folder
            .clone()
            .ok_or_else(|| AppError::NotFound(PathBuf::new()))?;
        let scanned = scan_directory(&folder, &self.extensions)?;
        Ok(self.merge_scan(scanned))
    }

    /// Publish the result of a scan that ran elsewhere (e.g. a worker thread).
    ///
    /// A scan of the loaded folder is merged like [`refresh`]; a scan of any
    /// other folder replaces the collection like [`load`].
    ///
    /// [`refresh`]: CollectionStore::refresh
    /// [`load`]: CollectionStore::load
    pub fn publish_scan(&mut self, folder: PathBuf, scanned: Vec<ScannedFile>) -> RefreshSummary {
        if self.current.folder.as_deref() == Some(folder.as_path()) {
            return self.merge_scan(scanned);
        }
        let added = scanned.len();
        self.replace(folder, scanned);
        RefreshSummary {
            added,
            ..Default::default()
        }
    }

    /// Point the entry at `path` to its new name after a successful rename.
    pub fn apply_rename(&mut self, path: &Path, new_display_name: &str) -> Result<()> {
        let collection = Arc::make_mut(&mut self.current);
        let entry = collection
            .entries
            .iter_mut()
            .find(|e| e.path() == path)
            .ok_or_else(|| AppError::NotFoundInCollection(path.to_path_buf()))?;
        entry.set_path(path.with_file_name(new_display_name));
        collection.generation += 1;
        Ok(())
    }

    /// Tag an entry. Returns `false` if it already carried the tag.
    pub fn add_keyword(&mut self, id: EntryId, keyword: &str) -> Result<bool> {
        let keyword = normalize_keyword(keyword)?;
        self.update_entry(id, |entry| entry.insert_keyword(keyword))
    }

    /// Remove a tag. Returns `false` if the entry did not carry it.
    pub fn remove_keyword(&mut self, id: EntryId, keyword: &str) -> Result<bool> {
        let keyword = keyword.trim().to_lowercase();
        self.update_entry(id, |entry| entry.remove_keyword(&keyword))
    }

    fn update_entry(&mut self, id: EntryId, f: impl FnOnce(&mut Entry) -> bool) -> Result<bool> {
        let index = self
            .current
            .entries
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| AppError::NotFoundInCollection(PathBuf::from(id.to_string())))?;
        let collection = Arc::make_mut(&mut self.current);
        let changed = f(&mut collection.entries[index]);
        if changed {
            collection.generation += 1;
        }
        Ok(changed)
    }

    fn replace(&mut self, folder: PathBuf, scanned: Vec<ScannedFile>) -> LoadStatus {
        let entries: Vec<Entry> = scanned
            .into_iter()
            .map(|file| Entry::from_scan(self.allocate_id(), file))
            .collect();
        let count = entries.len();
        info!("loaded {} images from {}", count, folder.display());
        self.current = Arc::new(Collection {
            folder: Some(folder),
            entries,
            generation: self.current.generation + 1,
        });
        if count == 0 {
            LoadStatus::Empty
        } else {
            LoadStatus::Loaded(count)
        }
    }

    fn merge_scan(&mut self, scanned: Vec<ScannedFile>) -> RefreshSummary {
        let fresh: HashMap<&Path, &ScannedFile> =
            scanned.iter().map(|f| (f.path.as_path(), f)).collect();
        let mut summary = RefreshSummary::default();
        let mut entries = Vec::with_capacity(scanned.len());
        let mut kept: HashSet<PathBuf> = HashSet::new();

        for entry in self.current.entries.iter() {
            match fresh.get(entry.path()) {
                Some(file) => {
                    let mut entry = entry.clone();
                    if entry.refresh_metadata(file) {
                        summary.updated += 1;
                    }
                    kept.insert(entry.path().to_path_buf());
                    entries.push(entry);
                }
                None => summary.removed += 1,
            }
        }

        for file in scanned.iter() {
            if !kept.contains(&file.path) {
                let id = self.allocate_id();
                entries.push(Entry::from_scan(id, file.clone()));
                summary.added += 1;
            }
        }

        if summary.is_unchanged() {
            debug!("refresh: no changes");
            return summary;
        }

        info!(
            "refresh: {} added, {} removed, {} updated",
            summary.added, summary.removed, summary.updated
        );
        let collection = Arc::make_mut(&mut self.current);
        collection.entries = entries;
        collection.generation += 1;
        summary
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }
}
