//! Document persistence for the tree shell
//!
//! The document lives in a single JSON file. Its location comes from
//! `TREE_FILE`, falling back to `~/.treeview/treeview.json`. A missing file is
//! not an error: the shell starts from the stock sample document instead.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use treeview_core::models::time::{format_timestamp, SystemTimeProvider};
use treeview_core::{TreeConfig, TreeDocument};

const TREE_FILE_ENV: &str = "TREE_FILE";
const TREE_CONFIG_ENV: &str = "TREE_CONFIG";
const DOCUMENT_FILE: &str = "treeview.json";

/// Path of the document file
///
/// Checks `TREE_FILE` first, then falls back to `~/.treeview/treeview.json`.
pub fn default_document_path() -> Result<PathBuf> {
    if let Ok(env_path) = std::env::var(TREE_FILE_ENV) {
        tracing::info!("Using document path from {}: {}", TREE_FILE_ENV, env_path);
        return Ok(PathBuf::from(env_path));
    }

    let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("Failed to get home directory"))?;
    Ok(home_dir.join(".treeview").join(DOCUMENT_FILE))
}

/// Load the document at `path`, or the sample document if there is none
pub fn load_document(path: &Path, config: &TreeConfig) -> Result<TreeDocument> {
    if !path.exists() {
        tracing::info!("No document at {}; starting from sample data", path.display());
        let stamp = format_timestamp(&SystemTimeProvider, &config.timestamp_format);
        return Ok(TreeDocument::sample(&stamp));
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))?;
    let document = TreeDocument::from_json_str(&contents)
        .with_context(|| format!("Failed to parse document {}", path.display()))?;

    tracing::info!(
        "Loaded {} node(s) from {}",
        document.node_count(),
        path.display()
    );
    Ok(document)
}

/// Save the document to `path`
///
/// Uses atomic write pattern (write-to-temp, then rename) so a crash never
/// leaves a half-written document behind.
pub fn save_document(path: &Path, document: &TreeDocument) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("Document path {} has no file name", path.display()))?;
    let temp_file = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

    let serialized = document.to_json_string_pretty()?;
    fs::write(&temp_file, serialized)
        .with_context(|| format!("Failed to write {}", temp_file.display()))?;
    fs::rename(&temp_file, path)
        .with_context(|| format!("Failed to save document {}", path.display()))?;

    tracing::info!("Saved {} node(s) to {}", document.node_count(), path.display());
    Ok(())
}

/// Editor configuration from the file named by `TREE_CONFIG`, or the default
pub fn load_config() -> Result<TreeConfig> {
    match std::env::var(TREE_CONFIG_ENV) {
        Ok(config_path) => load_config_from(Path::new(&config_path)),
        Err(_) => Ok(TreeConfig::default()),
    }
}

pub fn load_config_from(path: &Path) -> Result<TreeConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = TreeConfig::from_json_str(&contents)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}
