//! Sorting and filtering of a collection into a [`View`].

use std::cmp::Ordering;
use std::fmt;

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::collection::{Collection, Entry, EntryId};

/// Sort criteria for a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// File name A→Z (case-insensitive), default.
    #[default]
    NameAsc,
    /// File name Z→A.
    NameDesc,
    /// Oldest first.
    DateAsc,
    /// Newest first.
    DateDesc,
}

impl SortKey {
    /// Parse from config/session strings ("name-asc", "date-desc", ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "name-asc" | "name" => Some(SortKey::NameAsc),
            "name-desc" => Some(SortKey::NameDesc),
            "date-asc" => Some(SortKey::DateAsc),
            "date-desc" | "date" => Some(SortKey::DateDesc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::NameAsc => "name-asc",
            SortKey::NameDesc => "name-desc",
            SortKey::DateAsc => "date-asc",
            SortKey::DateDesc => "date-desc",
        }
    }

    /// Cycle to the next sort option.
    pub fn next(&self) -> Self {
        match self {
            SortKey::NameAsc => SortKey::NameDesc,
            SortKey::NameDesc => SortKey::DateAsc,
            SortKey::DateAsc => SortKey::DateDesc,
            SortKey::DateDesc => SortKey::NameAsc,
        }
    }

    fn compare(&self, a: &SortRow<'_>, b: &SortRow<'_>) -> Ordering {
        match self {
            SortKey::NameAsc => a.name.cmp(&b.name),
            SortKey::NameDesc => b.name.cmp(&a.name),
            SortKey::DateAsc => a.entry.modified().cmp(&b.entry.modified()),
            SortKey::DateDesc => b.entry.modified().cmp(&a.entry.modified()),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to derive a view from a collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSpec {
    pub key: SortKey,
    /// Only keep entries carrying this keyword.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_filter: Option<String>,
}

impl ViewSpec {
    pub fn new(key: SortKey, keyword_filter: Option<String>) -> Self {
        Self {
            key,
            keyword_filter: keyword_filter.filter(|k| !k.trim().is_empty()),
        }
    }
}

/// Ordered entry ids derived from one generation of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    generation: u64,
    ids: Vec<EntryId>,
}

impl View {
    pub fn ids(&self) -> &[EntryId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Generation of the collection this view was computed from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the view still matches `collection`.
    pub fn is_current(&self, collection: &Collection) -> bool {
        self.generation == collection.generation()
    }

    /// Position of `id` within the view.
    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.ids.iter().position(|i| *i == id)
    }
}

struct SortRow<'a> {
    name: String,
    entry: &'a Entry,
}

/// Filter then sort `collection` according to `spec`.
///
/// Ties on the sort key are broken by path so the result is fully
/// deterministic, even for names differing only in case.
pub fn build_view(collection: &Collection, spec: &ViewSpec) -> View {
    let keyword = spec.keyword_filter.as_deref();
    let mut rows: Vec<SortRow<'_>> = collection
        .entries()
        .iter()
        .filter(|e| keyword.map_or(true, |k| e.has_keyword(k)))
        .map(|entry| SortRow {
            name: entry.display_name().to_lowercase(),
            entry,
        })
        .collect();

    rows.sort_by(|a, b| {
        spec.key
            .compare(a, b)
            .then_with(|| a.entry.path().cmp(b.entry.path()))
    });

    debug!(
        "view {:?}: {} of {} entries (generation {})",
        spec,
        rows.len(),
        collection.len(),
        collection.generation()
    );

    View {
        generation: collection.generation(),
        ids: rows.iter().map(|row| row.entry.id()).collect(),
    }
}
