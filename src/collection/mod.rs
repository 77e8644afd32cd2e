//! In-memory model of a loaded image folder.
//!
//! A [`Collection`] is an immutable-by-default snapshot of the entries of one
//! folder, tagged with a generation number. [`CollectionStore`] owns the
//! current snapshot and is the only place that mutates it.

pub mod entry;
pub mod store;

pub use entry::{Entry, EntryId};
pub use store::{CollectionStore, LoadStatus, RefreshSummary};

use std::path::{Path, PathBuf};

/// Ordered entries of one folder at one generation.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    folder: Option<PathBuf>,
    entries: Vec<Entry>,
    generation: u64,
}

impl Collection {
    #[cfg(test)]
    pub(crate) fn from_parts(folder: Option<PathBuf>, entries: Vec<Entry>, generation: u64) -> Self {
        Self {
            folder,
            entries,
            generation,
        }
    }

    /// Folder this collection was loaded from, if any.
    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    /// Entries in insertion (scan) order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mutation counter; any change to the entries bumps it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Look up an entry by id.
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// Look up an entry by its current path.
    pub fn find_by_path(&self, path: &Path) -> Option<&Entry> {
        self.entries.iter().find(|e| e.path() == path)
    }
}
