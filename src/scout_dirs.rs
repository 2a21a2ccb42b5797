//! Centralized directory paths for thesis-scout.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | Linux | macOS |
//! |---------|-------|-------|
//! | Data (job store) | `~/.local/share/thesis-scout/` | `~/Library/Application Support/thesis-scout/` |
//! | Config | `~/.config/thesis-scout/` | `~/Library/Application Support/thesis-scout/` |
//!
//! # Environment Overrides
//!
//! - `THESIS_SCOUT_DATA_DIR` overrides [`data_dir`]
//! - `THESIS_SCOUT_CONFIG_DIR` overrides [`config_dir`]
//! - `THESIS_SCOUT_CONFIG` overrides [`config_file`] (full path)

use std::path::PathBuf;

const APP_DIR: &str = "thesis-scout";

/// Application data root. Holds the SQLite job database.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("THESIS_SCOUT_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/thesis-scout-data"))
}

/// Application config directory.
///
/// `XDG_CONFIG_HOME` is honoured first so Linux and macOS behave the same
/// when it is set explicitly.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("THESIS_SCOUT_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join(APP_DIR);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/thesis-scout-config"))
}

/// Path of `config.toml`.
#[must_use]
pub fn config_file() -> PathBuf {
    if let Some(path) = std::env::var_os("THESIS_SCOUT_CONFIG") {
        return PathBuf::from(path);
    }
    config_dir().join("config.toml")
}

/// Default path of the SQLite job database.
#[must_use]
pub fn jobs_db_file() -> PathBuf {
    data_dir().join("jobs.db")
}
