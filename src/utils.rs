use dirs::data_dir;
use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DATA_DIR_ENV: &str = "SHOW_VAULT_DATA_DIR";

static DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let root = std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let base = data_dir().unwrap_or_else(|| {
                std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
            });
            base.join("show-vault")
        });
    if let Err(err) = fs::create_dir_all(&root) {
        tracing::warn!("failed to create data root {:?}: {err}", root);
    }
    root
});

pub fn data_root() -> PathBuf {
    DATA_ROOT.clone()
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join("config.json")
}

/// File backing a named storage slot, e.g. `showVaultShows` -> `showVaultShows.json`.
pub fn slot_path(root: &Path, slot: &str) -> PathBuf {
    root.join(format!("{slot}.json"))
}

pub fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            tracing::warn!("failed to create parent {:?}: {err}", parent);
        }
    }
}

/// Normalizes whitespace the way user-typed fields are compared and stored.
pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
