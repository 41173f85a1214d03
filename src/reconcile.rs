//! Removal of stale output after a codelab was rewritten.
//!
//! Two cases:
//! - the codelab kept its directory: [`reconcile_assets`] deletes asset files
//!   the fresh export no longer references;
//! - the codelab moved to a new directory: [`remove_superseded`] deletes the old
//!   tree as a whole.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::contract::AssetMap;

/// Deletes every file directly inside `dir` whose name is not a key of `keep`.
///
/// Only the direct entries of `dir` are considered; subdirectories are left
/// untouched. A missing `dir` has nothing to reconcile. The first listing or
/// removal error aborts, files removed up to that point stay removed.
///
/// Returns the removed paths.
pub async fn reconcile_assets(dir: &Path, keep: &AssetMap) -> io::Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut removed = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if name.to_str().is_some_and(|name| keep.contains_key(name)) {
            continue;
        }
        let path = entry.path();
        tokio::fs::remove_file(&path).await?;
        debug!(path = %path.display(), "Removed orphaned asset");
        removed.push(path);
    }

    if !removed.is_empty() {
        info!(dir = %dir.display(), removed = removed.len(), "Removed orphaned assets");
    }
    Ok(removed)
}

/// Removes a codelab directory that was superseded by a new one.
///
/// A directory that is already gone counts as removed.
pub async fn remove_superseded(dir: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            info!(dir = %dir.display(), "Removed superseded codelab directory");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
