//! Cross-run state: recent folders, last view, random mode.
//!
//! Stored as a small JSON document. Every recognised field is decoded on its
//! own so one bad value only resets that field; unknown fields are carried
//! through a load/save round-trip untouched.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::ordering::ViewSpec;

const RECENT_FOLDERS: &str = "recentFolders";
const LAST_SORT_SPEC: &str = "lastSortSpec";
const RANDOM_MODE_ENABLED: &str = "randomModeEnabled";
const LAST_OPEN_PATH: &str = "lastOpenPath";
const LAST_KEYWORD: &str = "lastKeyword";
const BATCH_PATH: &str = "batchPath";

/// Persisted state of the application between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Most recently used first.
    pub recent_folders: Vec<PathBuf>,
    pub last_sort_spec: ViewSpec,
    pub random_mode_enabled: bool,
    /// Image shown last.
    pub last_open_path: Option<PathBuf>,
    /// Keyword last typed by the user.
    pub last_keyword: Option<String>,
    /// Folder of the last batch rename.
    pub batch_path: Option<PathBuf>,
    /// Fields this version does not know about.
    pub extra: Map<String, Value>,
}

impl Session {
    fn from_document(mut doc: Map<String, Value>) -> Self {
        Session {
            recent_folders: take_field(&mut doc, RECENT_FOLDERS),
            last_sort_spec: take_field(&mut doc, LAST_SORT_SPEC),
            random_mode_enabled: take_field(&mut doc, RANDOM_MODE_ENABLED),
            last_open_path: take_field(&mut doc, LAST_OPEN_PATH),
            last_keyword: take_field(&mut doc, LAST_KEYWORD),
            batch_path: take_field(&mut doc, BATCH_PATH),
            extra: doc,
        }
    }

    fn to_document(&self) -> Result<Map<String, Value>> {
        let mut doc = self.extra.clone();
        doc.insert(
            RECENT_FOLDERS.into(),
            serde_json::to_value(&self.recent_folders)?,
        );
        doc.insert(
            LAST_SORT_SPEC.into(),
            serde_json::to_value(&self.last_sort_spec)?,
        );
        doc.insert(
            RANDOM_MODE_ENABLED.into(),
            Value::Bool(self.random_mode_enabled),
        );
        doc.insert(
            LAST_OPEN_PATH.into(),
            serde_json::to_value(&self.last_open_path)?,
        );
        doc.insert(LAST_KEYWORD.into(), serde_json::to_value(&self.last_keyword)?);
        doc.insert(BATCH_PATH.into(), serde_json::to_value(&self.batch_path)?);
        Ok(doc)
    }
}

/// Remove `key` from `doc` and decode it, falling back to the default.
fn take_field<T: DeserializeOwned + Default>(doc: &mut Map<String, Value>, key: &str) -> T {
    match doc.remove(key) {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!("session: ignoring invalid {}: {}", key, e);
            T::default()
        }),
        None => T::default(),
    }
}

/// Reads and writes the session document.
pub struct SessionStore {
    path: PathBuf,
    recent_limit: usize,
}

impl SessionStore {
    pub fn new(path: PathBuf, recent_limit: usize) -> Self {
        Self {
            path,
            recent_limit: recent_limit.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the session. A missing or unreadable document yields defaults.
    pub fn load(&self) -> Session {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("session: {} not loaded: {}", self.path.display(), e);
                return Session::default();
            }
        };
        let doc = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(doc)) => doc,
            Ok(_) => {
                warn!("session: {} is not a JSON object", self.path.display());
                return Session::default();
            }
            Err(e) => {
                warn!("session: {} is corrupt: {}", self.path.display(), e);
                return Session::default();
            }
        };

        let mut session = Session::from_document(doc);
        let mut seen = std::collections::HashSet::new();
        session.recent_folders.retain(|p| seen.insert(p.clone()));
        session.recent_folders.truncate(self.recent_limit);
        session
    }

    /// Write the session atomically: a sibling temp file is written and
    /// then renamed over the document.
    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&Value::Object(session.to_document()?))?;

        let tmp_path = self.path.with_extension("json.tmp");
        let written = fs::File::create(&tmp_path).and_then(|mut file| {
            file.write_all(&json)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        fs::rename(&tmp_path, &self.path)?;
        debug!("session saved to {}", self.path.display());
        Ok(())
    }

    /// Move `folder` to the front of the recent list, evicting the oldest
    /// entries past the cap.
    pub fn touch_recent_folder(&self, session: &mut Session, folder: &Path) {
        session.recent_folders.retain(|p| p != folder);
        session.recent_folders.insert(0, folder.to_path_buf());
        session.recent_folders.truncate(self.recent_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::SortKey;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("state").join("session.json"), 3)
    }

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(store(&tmp).load(), Session::default());
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();
        assert_eq!(store.load(), Session::default());
        fs::write(store.path(), "[1, 2]").unwrap();
        assert_eq!(store.load(), Session::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let session = Session {
            recent_folders: vec![PathBuf::from("/b"), PathBuf::from("/a")],
            last_sort_spec: ViewSpec::new(SortKey::DateDesc, Some("vac".into())),
            random_mode_enabled: true,
            last_open_path: Some(PathBuf::from("/b/x.png")),
            last_keyword: Some("vac".into()),
            batch_path: None,
            extra: Map::new(),
        };
        store.save(&session).unwrap();
        assert_eq!(store.load(), session);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn bad_field_only_resets_that_field() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{
                "recentFolders": ["/pics"],
                "lastSortSpec": {"key": "sideways"},
                "randomModeEnabled": "yes"
            }"#,
        )
        .unwrap();

        let session = store.load();
        assert_eq!(session.recent_folders, vec![PathBuf::from("/pics")]);
        assert_eq!(session.last_sort_spec, ViewSpec::default());
        assert!(!session.random_mode_enabled);
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"randomModeEnabled": true, "windowWidth": 1200, "theme": {"dark": true}}"#,
        )
        .unwrap();

        let mut session = store.load();
        assert!(session.random_mode_enabled);
        assert_eq!(session.extra.get("windowWidth"), Some(&Value::from(1200)));

        session.random_mode_enabled = false;
        store.save(&session).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["windowWidth"], Value::from(1200));
        assert_eq!(raw["theme"]["dark"], Value::Bool(true));
        assert_eq!(raw["randomModeEnabled"], Value::Bool(false));
    }

    #[test]
    fn sort_spec_document_shape() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let session = Session {
            last_sort_spec: ViewSpec::new(SortKey::NameDesc, Some("cat".into())),
            ..Default::default()
        };
        store.save(&session).unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["lastSortSpec"]["key"], Value::from("name-desc"));
        assert_eq!(raw["lastSortSpec"]["keywordFilter"], Value::from("cat"));
    }

    #[test]
    fn touch_moves_to_front_and_caps() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let mut session = Session::default();
        for folder in ["/a", "/b", "/c"] {
            store.touch_recent_folder(&mut session, Path::new(folder));
        }
        assert_eq!(
            session.recent_folders,
            vec![PathBuf::from("/c"), PathBuf::from("/b"), PathBuf::from("/a")]
        );

        store.touch_recent_folder(&mut session, Path::new("/a"));
        assert_eq!(
            session.recent_folders,
            vec![PathBuf::from("/a"), PathBuf::from("/c"), PathBuf::from("/b")]
        );

        store.touch_recent_folder(&mut session, Path::new("/d"));
        assert_eq!(
            session.recent_folders,
            vec![PathBuf::from("/d"), PathBuf::from("/a"), PathBuf::from("/c")]
        );
    }

    #[test]
    fn load_trims_overlong_recent_list() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"recentFolders": ["/a", "/b", "/a", "/c", "/d"]}"#,
        )
        .unwrap();
        assert_eq!(
            store.load().recent_folders,
            vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")]
        );
    }
}
