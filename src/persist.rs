// JSON document file operations

use crate::migrate;
use crate::models::{StoreDocument, now_ms};
use eyre::{Context, Result, eyre};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What was found at the data file path
#[derive(Debug)]
pub enum LoadOutcome {
    /// No file yet
    Missing,
    /// File exists but could not be read or decoded
    Corrupt(String),
    /// A usable document. `migrated` is set when an older shape was upgraded,
    /// `dropped` counts records that could not be decoded and were skipped.
    Loaded {
        document: StoreDocument,
        migrated: bool,
        dropped: usize,
    },
}

/// Read and classify the document at `path`
pub fn read_document(path: &Path) -> LoadOutcome {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return LoadOutcome::Missing,
        Err(e) => return LoadOutcome::Corrupt(format!("failed to read file: {}", e)),
    };
    parse_document(&content)
}

/// Decode a document, upgrading older shapes on the way
pub fn parse_document(content: &str) -> LoadOutcome {
    let mut raw: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => return LoadOutcome::Corrupt(format!("invalid JSON: {}", e)),
    };

    let has_lists = raw.get("categories").is_some_and(Value::is_array) && raw.get("todos").is_some_and(Value::is_array);
    if !has_lists {
        return LoadOutcome::Corrupt("missing categories or todos list".to_string());
    }

    let migrated = migrate::upgrade(&mut raw);

    let mut dropped = 0;
    let categories = decode_records(take_array(&mut raw, "categories"), "category", &mut dropped);
    let todos = decode_records(take_array(&mut raw, "todos"), "todo", &mut dropped);

    LoadOutcome::Loaded {
        document: StoreDocument { categories, todos },
        migrated,
        dropped,
    }
}

fn take_array(raw: &mut Value, key: &str) -> Vec<Value> {
    match raw.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Decode each record on its own, skipping the ones that don't fit
fn decode_records<T: DeserializeOwned>(items: Vec<Value>, kind: &str, dropped: &mut usize) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(kind, index, error = %e, "Skipping undecodable record");
                *dropped += 1;
                None
            }
        })
        .collect()
}

/// Write the document atomically: temp file, fsync, rename over the target.
///
/// Writers are serialized through an exclusive lock on `<file>.lock`.
pub fn write_document(path: &Path, document: &StoreDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(document).context("Failed to serialize document")?;

    let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir).context("Failed to create data directory")?;
    }

    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(with_suffix(path, ".lock"))
        .context("Failed to open lock file")?;
    lock.lock_exclusive().context("Failed to acquire file lock")?;

    let tmp_path = with_suffix(path, ".tmp");
    {
        let mut file = File::create(&tmp_path).context("Failed to create temp file")?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?; // Ensure data is flushed to disk
    }
    fs::rename(&tmp_path, path).with_context(|| format!("Failed to replace {}", path.display()))?;

    if let Some(dir) = dir {
        sync_dir(dir);
    }

    debug!(
        file = ?path,
        categories = document.categories.len(),
        todos = document.todos.len(),
        bytes = json.len(),
        "Wrote document"
    );

    // Lock is released when `lock` is dropped
    Ok(())
}

/// Copy an unreadable data file aside before it gets replaced.
///
/// The copy lands next to the original as `<stem>-backup-<millis>.<ext>`.
pub fn backup_corrupt(path: &Path) -> Result<PathBuf> {
    let backup = backup_path(path, now_ms())?;
    fs::copy(path, &backup).with_context(|| format!("Failed to back up {}", path.display()))?;
    info!(file = ?path, backup = ?backup, "Backed up corrupt data file");
    Ok(backup)
}

pub fn backup_path(path: &Path, timestamp_ms: i64) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| eyre!("Invalid data file name: {:?}", path))?;

    let name = match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{}-backup-{}.{}", stem, timestamp_ms, ext),
        None => format!("{}-backup-{}", stem, timestamp_ms),
    };
    Ok(path.with_file_name(name))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        warn!(dir = ?dir, error = ?e, "Failed to sync data directory");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
