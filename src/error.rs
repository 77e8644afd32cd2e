use std::path::PathBuf;

use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A folder or file that was asked for does not exist.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Bad parameters for a rename or tagging request.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A rename plan would overwrite or duplicate a file. Nothing was touched.
    #[error("Rename collision: {0}")]
    Collision(String),

    /// The sequencer was advanced over a view with nothing in it.
    #[error("Nothing to show: the current view is empty")]
    EmptyView,

    /// A path or id that should be tracked by the collection is missing.
    #[error("Not in collection: {}", .0.display())]
    NotFoundInCollection(PathBuf),

    /// A view, plan or sequencer was used after the collection changed.
    #[error("Collection changed (generation {actual}, expected {expected}); recompute and retry")]
    StaleGeneration { expected: u64, actual: u64 },

    /// Rolling back a failed rename batch failed too. The listed files
    /// are left under temporary or new names.
    #[error("Rollback failed, files left in an inconsistent state: {}", format_paths(.paths))]
    UnrecoverableState { paths: Vec<PathBuf> },

    /// A rename batch stopped and was undone. Every file is back in place.
    #[error("Rename rolled back: {0}")]
    RenameRolledBack(String),

    /// Session document could not be serialized.
    #[error("Session error: {0}")]
    Session(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Session(err.to_string())
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
