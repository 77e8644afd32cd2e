//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--sort`, `--interval-ms`, etc.)
//! 2. `$RANDORA_CONFIG` environment variable (path to config file)
//! 3. Project-local `.randora.toml` in the current working directory
//! 4. Global `~/.config/randora/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use log::warn;
use serde::Deserialize;

use crate::ordering::SortKey;

// ── Section configs ──────────────────────────────────────────────────────────

/// General settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Image extensions picked up by the folder scan (without leading dot).
    pub extensions: Option<Vec<String>>,
}

/// Playback settings for the `play` command.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Sort order: "name-asc", "name-desc", "date-asc", "date-desc".
    pub sort: Option<String>,
    /// Start in random mode.
    pub random: Option<bool>,
    /// Delay between two images in milliseconds.
    pub interval_ms: Option<u64>,
}

/// Batch rename settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RenameConfig {
    /// Zero-pad sequence numbers to this many digits (0 = no padding).
    pub pad_width: Option<usize>,
}

/// Session persistence settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Location of the session document.
    pub path: Option<PathBuf>,
    /// Number of recent folders to remember.
    pub recent_limit: Option<usize>,
}

/// Filesystem watcher settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WatcherConfig {
    /// Rescan the folder when files change during playback.
    pub enabled: Option<bool>,
    /// Debounce interval in milliseconds.
    pub debounce_ms: Option<u64>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub playback: PlaybackConfig,
    pub rename: RenameConfig,
    pub session: SessionConfig,
    pub watcher: WatcherConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

/// Extensions scanned when the config does not list any.
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];
/// Default delay between two images during playback.
pub const DEFAULT_INTERVAL_MS: u64 = 3_000;
/// Default number of remembered folders.
pub const DEFAULT_RECENT_LIMIT: usize = 10;
/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path — that is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("RANDORA_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".randora.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("randora").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning logged).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!("failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self` — `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                extensions: other
                    .general
                    .extensions
                    .clone()
                    .or(self.general.extensions),
            },
            playback: PlaybackConfig {
                sort: other.playback.sort.clone().or(self.playback.sort),
                random: other.playback.random.or(self.playback.random),
                interval_ms: other.playback.interval_ms.or(self.playback.interval_ms),
            },
            rename: RenameConfig {
                pad_width: other.rename.pad_width.or(self.rename.pad_width),
            },
            session: SessionConfig {
                path: other.session.path.clone().or(self.session.path),
                recent_limit: other.session.recent_limit.or(self.session.recent_limit),
            },
            watcher: WatcherConfig {
                enabled: other.watcher.enabled.or(self.watcher.enabled),
                debounce_ms: other.watcher.debounce_ms.or(self.watcher.debounce_ms),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Walk in reverse so that highest-priority (env var) overwrites lower.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    /// Lower-cased extension allow-list for the folder scan.
    pub fn extensions(&self) -> Vec<String> {
        match &self.general.extensions {
            Some(list) if !list.is_empty() => list
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            _ => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Playback sort key. Unknown strings fall back to name ascending.
    pub fn sort_key(&self) -> SortKey {
        self.playback
            .sort
            .as_deref()
            .and_then(SortKey::parse)
            .unwrap_or_default()
    }

    /// Random mode requested by a config file or flag. `None` leaves the
    /// choice to the saved session.
    pub fn random(&self) -> Option<bool> {
        self.playback.random
    }

    /// Delay between two images during playback.
    pub fn interval_ms(&self) -> u64 {
        self.playback.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS)
    }

    /// Minimum digit count for rename sequence numbers.
    pub fn pad_width(&self) -> usize {
        self.rename.pad_width.unwrap_or(0)
    }

    /// Where the session document lives, if a location can be determined.
    pub fn session_path(&self) -> Option<PathBuf> {
        self.session.path.clone().or_else(|| {
            dirs::config_dir().map(|dir| dir.join("randora").join("session.json"))
        })
    }

    /// Cap of the recent-folders list.
    pub fn recent_limit(&self) -> usize {
        self.session
            .recent_limit
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RECENT_LIMIT)
    }

    /// Whether the watcher is enabled.
    pub fn watcher_enabled(&self) -> bool {
        self.watcher.enabled.unwrap_or(true)
    }

    /// Watcher debounce interval in milliseconds.
    pub fn debounce_ms(&self) -> u64 {
        self.watcher.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
