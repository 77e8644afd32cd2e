use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name prefix marking files parked by an in-flight batch rename.
const TEMP_PREFIX: &str = ".__randora_tmp_";

/// Filesystem access used by the rename executor.
///
/// Production code uses [`FsRenamer`]; tests swap in implementations that
/// fail on demand.
pub trait Renamer {
    /// Rename (move) `from` to `to` within the same directory.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Whether something already exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    /// Whether `a` and `b` name the same file on disk, e.g. two spellings
    /// of one name on a case-insensitive filesystem.
    fn same_file(&self, a: &Path, b: &Path) -> bool {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            match (fs::metadata(a), fs::metadata(b)) {
                (Ok(x), Ok(y)) => x.dev() == y.dev() && x.ino() == y.ino(),
                _ => false,
            }
        }
        #[cfg(not(unix))]
        {
            match (a.canonicalize(), b.canonicalize()) {
                (Ok(x), Ok(y)) => x == y,
                _ => false,
            }
        }
    }
}

/// [`Renamer`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRenamer;

impl Renamer for FsRenamer {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

/// Build the temporary sibling path used to park `path` during a batch.
///
/// `token` keeps names unique across batches; `index` across one batch.
pub fn temp_path_for(path: &Path, token: u64, index: usize) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{}{:016x}_{}__{}", TEMP_PREFIX, token, index, name))
}

/// Whether `path` is a temporary name produced by [`temp_path_for`].
pub fn is_temp_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(TEMP_PREFIX))
        .unwrap_or(false)
}

/// Base name of `path` as an owned string.
pub fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_rename() {
        let tmp = TempDir::new().unwrap();
        let old_path = tmp.path().join("old.png");
        let new_path = tmp.path().join("new.png");
        fs::write(&old_path, "").unwrap();
        FsRenamer.rename(&old_path, &new_path).unwrap();
        assert!(!old_path.exists());
        assert!(new_path.exists());
    }

    #[test]
    fn test_rename_nonexistent_fails() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("no_such_file.png");
        let to = tmp.path().join("dest.png");
        assert!(FsRenamer.rename(&from, &to).is_err());
    }

    #[test]
    fn test_exists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("here.png");
        assert!(!FsRenamer.exists(&path));
        fs::write(&path, "").unwrap();
        assert!(FsRenamer.exists(&path));
    }

    #[test]
    fn test_same_file() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.png");
        let b = tmp.path().join("b.png");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();
        assert!(FsRenamer.same_file(&a, &a));
        assert!(FsRenamer.same_file(&a, &tmp.path().join(".").join("a.png")));
        assert!(!FsRenamer.same_file(&a, &b));
        assert!(!FsRenamer.same_file(&a, &tmp.path().join("missing.png")));
    }

    #[test]
    fn test_temp_path_is_sibling_and_recognised() {
        let temp = temp_path_for(Path::new("/pics/a.png"), 0xabc, 2);
        assert_eq!(temp.parent(), Some(Path::new("/pics")));
        assert!(is_temp_name(&temp));
        assert!(temp.to_string_lossy().ends_with("__a.png"));
        assert!(!is_temp_name(Path::new("/pics/a.png")));
    }

    #[test]
    fn test_temp_paths_differ_by_index() {
        let p = Path::new("/pics/a.png");
        assert_ne!(temp_path_for(p, 1, 0), temp_path_for(p, 1, 1));
        assert_ne!(temp_path_for(p, 1, 0), temp_path_for(p, 2, 0));
    }

    #[test]
    fn test_file_name_string() {
        assert_eq!(file_name_string(Path::new("/x/y/z.gif")), "z.gif");
    }
}
