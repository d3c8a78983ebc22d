// src/store.rs
// Raw payload snapshots, written as received so a run can be inspected later.
// Nothing here is read back; every run fetches fresh.

use std::{fs, path::{Path, PathBuf}};

use log::debug;
use serde_json::Value;

use crate::core::sanitize::sanitize_file_stem;
use crate::error::{Error, Result};
use crate::file::ensure_directory;

/// `<dir>/<stem>.json`, pretty-printed.
pub fn save_snapshot(dir: &Path, stem: &str, data: &Value) -> Result<PathBuf> {
    ensure_directory(dir)?;
    let path = dir.join(format!("{}.json", sanitize_file_stem(stem, "snapshot")));
    let text = serde_json::to_string_pretty(data)?;
    fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
    debug!("Snapshot {}", path.display());
    Ok(path)
}

/// Snapshot stem for page `n` (1-based) of the house listing.
pub fn page_stem(n: usize) -> String {
    format!("houses_page_{n:03}")
}
