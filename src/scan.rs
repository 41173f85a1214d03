//! Workspace discovery: finds every directory holding a `codelab.json`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::meta::META_FILENAME;

/// Looks for codelab metadata files under `roots`, recursively.
///
/// Every root is walked concurrently on the blocking pool. Roots may overlap:
/// hits are canonicalized and de-duplicated, and come back sorted. The first
/// root that cannot be walked fails the whole scan.
pub async fn scan_paths(roots: &[PathBuf]) -> Result<Vec<PathBuf>, ScanError> {
    let walks = roots.iter().cloned().map(|root| async move {
        let walked = root.clone();
        match tokio::task::spawn_blocking(move || walk_path(&walked)).await {
            Ok(result) => result,
            Err(e) => Err(ScanError {
                root,
                source: std::io::Error::other(e.to_string()),
            }),
        }
    });
    let found = try_join_all(walks).await?;

    let dirs: BTreeSet<PathBuf> = found.into_iter().flatten().collect();
    info!(
        roots = roots.len(),
        codelabs = dirs.len(),
        "Scanned workspace for codelabs"
    );
    Ok(dirs.into_iter().collect())
}

/// Walks `root` looking for [`META_FILENAME`] files and returns their
/// canonical parent directories.
pub fn walk_path(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let scan_err = |source: std::io::Error| ScanError {
        root: root.to_path_buf(),
        source,
    };

    let mut dirs = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| scan_err(e.into()))?;
        if !entry.file_type().is_file() || entry.file_name() != META_FILENAME {
            continue;
        }
        let Some(parent) = entry.path().parent() else {
            continue;
        };
        let dir = parent.canonicalize().map_err(scan_err)?;
        debug!(dir = %dir.display(), "Found codelab");
        dirs.push(dir);
    }
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn codelab(root: &Path, rel: &str) -> PathBuf {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(META_FILENAME), "{}").unwrap();
        dir.canonicalize().unwrap()
    }

    #[tokio::test]
    async fn overlapping_roots_yield_each_codelab_once() {
        let ws = TempDir::new().unwrap();
        let a = codelab(ws.path(), "site/a");
        let b = codelab(ws.path(), "site/nested/b");

        let roots = vec![ws.path().to_path_buf(), ws.path().join("site"), ws.path().join("site/nested")];
        let dirs = scan_paths(&roots).await.expect("scan");

        assert_eq!(dirs, {
            let mut want = vec![a, b];
            want.sort();
            want
        });
    }

    #[tokio::test]
    async fn directories_named_like_the_metadata_file_are_ignored() {
        let ws = TempDir::new().unwrap();
        fs::create_dir_all(ws.path().join("odd").join(META_FILENAME)).unwrap();
        fs::write(ws.path().join("odd").join("other.json"), "{}").unwrap();

        let dirs = scan_paths(&[ws.path().to_path_buf()]).await.unwrap();
        assert!(dirs.is_empty(), "got {dirs:?}");
    }

    #[tokio::test]
    async fn missing_root_fails_and_names_the_root() {
        let ws = TempDir::new().unwrap();
        codelab(ws.path(), "a");
        let missing = ws.path().join("does-not-exist");

        let err = scan_paths(&[ws.path().to_path_buf(), missing.clone()])
            .await
            .unwrap_err();
        assert_eq!(err.root, missing);
        assert!(err.to_string().contains("does-not-exist"));
    }
}
