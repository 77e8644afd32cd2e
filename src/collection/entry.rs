use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{AppError, Result};
use crate::fs::operations::file_name_string;
use crate::fs::scan::ScannedFile;

/// Longest tag accepted by [`normalize_keyword`].
pub const MAX_KEYWORD_LEN: usize = 40;

/// Stable identifier of an entry within a store. Survives refresh and rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One tracked image file and its metadata snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    id: EntryId,
    path: PathBuf,
    display_name: String,
    modified: SystemTime,
    size: u64,
    keywords: BTreeSet<String>,
}

impl Entry {
    /// Build an entry from a scan result, deriving keywords from the file name.
    pub fn from_scan(id: EntryId, file: ScannedFile) -> Self {
        let display_name = file_name_string(&file.path);
        Self {
            id,
            keywords: keywords_from_name(&display_name),
            display_name,
            modified: file.modified,
            size: file.size,
            path: file.path,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn keywords(&self) -> &BTreeSet<String> {
        &self.keywords
    }

    /// Whether this entry carries `keyword` (case-insensitive).
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.contains(&keyword.trim().to_lowercase())
    }

    /// Move the entry to `new_path`, keeping the display name in sync.
    pub(crate) fn set_path(&mut self, new_path: PathBuf) {
        self.display_name = file_name_string(&new_path);
        self.path = new_path;
    }

    /// Take a new metadata snapshot. Returns `true` if anything changed.
    pub(crate) fn refresh_metadata(&mut self, file: &ScannedFile) -> bool {
        let changed = self.modified != file.modified || self.size != file.size;
        self.modified = file.modified;
        self.size = file.size;
        changed
    }

    pub(crate) fn insert_keyword(&mut self, keyword: String) -> bool {
        self.keywords.insert(keyword)
    }

    pub(crate) fn remove_keyword(&mut self, keyword: &str) -> bool {
        self.keywords.remove(keyword)
    }
}

/// Derive tags from a file name: the stem is split on `_`, `-`, `.` and
/// whitespace, numeric tokens are dropped, the rest is lower-cased.
///
/// `vac_12.jpg` yields `{"vac"}`.
pub fn keywords_from_name(name: &str) -> BTreeSet<String> {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    stem.split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .map(|token| token.to_lowercase())
        .filter(|token| token.chars().count() <= MAX_KEYWORD_LEN)
        .collect()
}

/// Validate and normalise a user-supplied tag.
///
/// Tags are trimmed and lower-cased, must be 1..=40 characters and must not
/// be the reserved word `none`.
pub fn normalize_keyword(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_KEYWORD_LEN {
        return Err(AppError::InvalidParameter(format!(
            "keyword must be 1 to {} characters, got {:?}",
            MAX_KEYWORD_LEN, raw
        )));
    }
    let lowered = trimmed.to_lowercase();
    if lowered == "none" {
        return Err(AppError::InvalidParameter(
            "\"none\" is reserved and cannot be used as a keyword".into(),
        ));
    }
    Ok(lowered)
}
