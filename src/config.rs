//! # Configuration Module
//!
//! Data directory discovery and runtime tunables for Dotify.
//!
//! ## Data Storage
//!
//! The library database lives in the platform-standard data directory:
//! - Linux: `~/.local/share/dotify/library.db`
//! - macOS: `~/Library/Application Support/dotify/library.db`
//! - Windows: `%APPDATA%\dotify\library.db`
//!
//! An optional `config.json` next to it overrides the defaults in
//! [`RuntimeConfig`]. Missing keys keep their default value. Command-line
//! flags win over both.

use crate::provider::SongOrdering;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DB_FILE_NAME: &str = "library.db";

/// Returns the Dotify data directory, creating it if needed.
///
/// # Errors
///
/// Fails when the platform has no data directory or the `dotify`
/// subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Pass --db to choose a database location."
        )
    })?;

    let dotify_dir = data_dir.join("dotify");
    fs::create_dir_all(&dotify_dir).with_context(|| {
        format!(
            "Failed to create Dotify data directory at {}. Please check file permissions.",
            dotify_dir.display()
        )
    })?;

    Ok(dotify_dir)
}

/// Returns the default database file path inside [`get_data_dir`].
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE_NAME))
}

/// Knobs the engine reads at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Rows per browse page
    pub page_size: usize,
    /// Entries in each profile top list
    pub profile_top_n: usize,
    /// Songs in the friends chart
    pub friend_top_k: usize,
    /// Songs sampled per "for you" recommendation
    pub recommendation_size: usize,
    /// Song order when `--order` is not given
    pub default_ordering: SongOrdering,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DB_FILE_NAME),
            page_size: 20,
            profile_top_n: 10,
            friend_top_k: 50,
            recommendation_size: 5,
            default_ordering: SongOrdering::Default,
        }
    }
}

impl RuntimeConfig {
    /// Defaults, pointed at the platform database, then overlaid with
    /// `config.json` from the data directory when one exists.
    pub fn load() -> Result<Self> {
        let data_dir = get_data_dir()?;
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Self::from_file(&config_path);
        }
        Ok(Self { db_path: data_dir.join(DB_FILE_NAME), ..Self::default() })
    }

    /// Read a JSON config file. A relative `db_path` is resolved against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration from {}", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        if config.db_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.db_path = dir.join(&config.db_path);
            }
        }
        config.page_size = config.page_size.max(1);
        Ok(config)
    }

    /// Create configuration with explicit database path
    #[must_use]
    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.db_path = db_path;
        self
    }
}
