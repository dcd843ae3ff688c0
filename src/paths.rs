//! Directory layout helpers for repository data and user configuration.

use std::path::{Path, PathBuf};

/// Repository data directory (`<root>/.mx`).
pub(crate) fn mx_dir(root: &Path) -> PathBuf {
    root.join(".mx")
}

pub(crate) fn meta_path(mx: &Path) -> PathBuf {
    mx.join("meta.json")
}

pub(crate) fn objects_dir(mx: &Path) -> PathBuf {
    mx.join("objects")
}

pub(crate) fn refs_dir(mx: &Path) -> PathBuf {
    mx.join("refs")
}

pub(crate) fn links_path(mx: &Path) -> PathBuf {
    mx.join("links.jsonl")
}

pub(crate) fn head_path(mx: &Path) -> PathBuf {
    mx.join("HEAD")
}

pub(crate) fn access_log_path(mx: &Path) -> PathBuf {
    mx.join("access.jsonl")
}

/// Feed-layer data directory (`.mx/dagit`).
pub(crate) fn dagit_dir(mx: &Path) -> PathBuf {
    mx.join("dagit")
}

/// Base directory for user configuration.
///
/// Uses `MEMEX_CONFIG_DIR` if set, otherwise `~/.config/memex`.
pub(crate) fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("MEMEX_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return Some(PathBuf::from(dir));
        }
    }

    dirs::home_dir().map(|home| home.join(".config").join("memex"))
}

/// Shared identity file, one per user.
pub(crate) fn identity_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("identity.json"))
}
