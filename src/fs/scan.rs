use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, warn};

use crate::error::{AppError, Result};
use crate::fs::operations::is_temp_name;

/// One image file found by a folder scan, with its metadata snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// Check whether `path` carries one of the allowed extensions (case-insensitive).
///
/// `extensions` is expected lower-cased and without leading dots.
pub fn has_supported_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}

/// Scan `dir` (non-recursive) for image files.
///
/// Unreadable entries and broken symlinks are skipped. The result is sorted
/// by path so repeated scans of an unchanged folder agree on the order.
pub fn scan_directory(dir: &Path, extensions: &[String]) -> Result<Vec<ScannedFile>> {
    let start = std::time::Instant::now();
    if !dir.is_dir() {
        return Err(AppError::NotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if !has_supported_extension(&path, extensions) || is_temp_name(&path) {
            continue;
        }
        // Follows symlinks so a link to an image counts as the image.
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        files.push(ScannedFile {
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: metadata.len(),
            path,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(
        "scanned {} ({} images) in {:?}",
        dir.display(),
        files.len(),
        start.elapsed()
    );
    Ok(files)
}
