//! Per-codelab update pipeline: re-fetch, re-export, clean up.
//!
//! [`update_codelab`] takes one codelab directory through the full sequence:
//!   1. read the stored metadata record (fail before touching anything)
//!   2. apply the batch-wide overrides from [`UpdateOptions`]
//!   3. fetch and parse the source, stamp the record with its modification time
//!   4. work out the canonical directory from the freshly parsed id
//!   5. build an authenticated client when the source kind needs one
//!   6. retrieve assets, point image references at the local copies
//!   7. write the codelab and its record
//!   8. remove what the new export superseded: the whole old directory if the
//!      id changed, otherwise only the orphaned assets
//!
//! Nothing is removed before step 7 succeeded, so a failed update leaves the
//! previous export in place and can simply be retried.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, info};

use crate::contract::Collaborators;
use crate::error::UpdateError;
use crate::meta::{meta_path, read_meta, ContextMeta, Meta};
use crate::reconcile::{reconcile_assets, remove_superseded};

/// Name of the asset directory inside a codelab directory.
pub const IMG_DIRNAME: &str = "img";

/// Overrides applied to every codelab of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Replaces the stored URL prefix when set and non-empty.
    pub prefix: Option<String>,
    /// Replaces the stored analytics id when set and non-empty.
    pub global_ga: Option<String>,
}

impl UpdateOptions {
    fn apply(&self, record: &mut ContextMeta) {
        if let Some(prefix) = self.prefix.as_deref().filter(|p| !p.is_empty()) {
            record.context.prefix = prefix.to_string();
        }
        if let Some(ga) = self.global_ga.as_deref().filter(|g| !g.is_empty()) {
            record.context.main_ga = ga.to_string();
        }
    }
}

/// Canonical output directory of a codelab under `base`.
///
/// The id must be a single normal path component, otherwise the directory could
/// resolve to `base` itself or escape it.
pub fn codelab_dir(base: &Path, meta: &Meta) -> Result<PathBuf, UpdateError> {
    let mut components = Path::new(&meta.id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(base.join(&meta.id)),
        _ => Err(UpdateError::InvalidId(meta.id.clone())),
    }
}

/// Re-exports the codelab stored in `dir` and removes stale output.
///
/// Returns the metadata of the freshly parsed codelab; its id may differ from
/// the stored one, in which case the codelab now lives in a sibling directory.
pub async fn update_codelab(
    dir: &Path,
    options: &UpdateOptions,
    deps: &Collaborators,
) -> Result<Meta, UpdateError> {
    let mut record = read_meta(&meta_path(dir)).await?;
    options.apply(&mut record);

    let source = record.context.source.clone();
    info!(dir = %dir.display(), source = %source, "Fetching codelab source");
    let parsed = deps
        .fetcher
        .fetch(&source)
        .await
        .map_err(|e| UpdateError::Fetch {
            reference: source.clone(),
            source: e,
        })?;
    record.context.updated = Some(parsed.modified);

    let base = dir
        .parent()
        .ok_or_else(|| UpdateError::NoParent(dir.to_path_buf()))?;
    let new_dir = codelab_dir(base, &parsed.codelab.meta)?;
    let old_dir = codelab_dir(base, &record.meta)?;
    let img_dir = new_dir.join(IMG_DIRNAME);

    let client = if parsed.kind.requires_auth() {
        debug!(dir = %dir.display(), "Source requires an authenticated client");
        Some(deps.clients.new_client().await.map_err(UpdateError::Client)?)
    } else {
        None
    };

    let mut codelab = parsed.codelab;
    let assets = deps
        .assets
        .slurp(client, &source, &img_dir, &codelab.steps)
        .await
        .map_err(|e| UpdateError::Assets {
            dir: img_dir.clone(),
            source: e,
        })?;
    codelab.rewrite_images(&assets, IMG_DIRNAME);

    let written = ContextMeta {
        meta: codelab.meta.clone(),
        context: record.context.clone(),
    };
    deps.writer
        .write(&new_dir, &codelab, &written)
        .await
        .map_err(|e| UpdateError::Write {
            dir: new_dir.clone(),
            source: e,
        })?;
    info!(dir = %new_dir.display(), id = %codelab.meta.id, assets = assets.len(), "Wrote codelab");

    if old_dir != new_dir {
        info!(
            old = %old_dir.display(),
            new = %new_dir.display(),
            "Codelab id changed, removing previous directory"
        );
        remove_superseded(&old_dir).await.map_err(|e| {
            error!(dir = %old_dir.display(), error = %e, "Failed to remove previous directory");
            UpdateError::Cleanup {
                path: old_dir.clone(),
                source: e,
            }
        })?;
    } else {
        reconcile_assets(&img_dir, &assets)
            .await
            .map_err(|e| UpdateError::Cleanup {
                path: img_dir.clone(),
                source: e,
            })?;
    }

    Ok(codelab.meta)
}
