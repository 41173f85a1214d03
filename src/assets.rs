//! Default asset retriever: puts every image a codelab references into its asset dir.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::contract::{AssetMap, AssetRetriever, BoxError, Step};

/// On-disk file name for an image reference.
///
/// Names are derived from the reference only, so re-exporting an unchanged
/// codelab produces the same file names.
pub fn asset_filename(reference: &str) -> String {
    let digest = {
        let mut hasher = Sha256::new();
        hasher.update(reference.as_bytes());
        format!("{:x}", hasher.finalize())
    };
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| (1..=5).contains(&e.len()) && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "png".to_string());
    format!("{}.{ext}", &digest[..32])
}

enum Location {
    Remote(String),
    Local(PathBuf),
}

fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Resolves an image reference relative to the codelab source it appeared in.
fn locate(source: &str, reference: &str) -> Result<Location, BoxError> {
    if is_url(reference) {
        return Ok(Location::Remote(reference.to_string()));
    }
    if is_url(source) {
        let url = reqwest::Url::parse(source)?.join(reference)?;
        return Ok(Location::Remote(url.to_string()));
    }
    let base = Path::new(source).parent().unwrap_or_else(|| Path::new("."));
    Ok(Location::Local(base.join(reference)))
}

/// Downloads remote images and copies local ones.
#[derive(Default)]
pub struct FsAssetRetriever {
    http: reqwest::Client,
}

impl FsAssetRetriever {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetRetriever for FsAssetRetriever {
    async fn slurp(
        &self,
        client: Option<reqwest::Client>,
        source: &str,
        dir: &Path,
        steps: &[Step],
    ) -> Result<AssetMap, BoxError> {
        tokio::fs::create_dir_all(dir).await?;
        let client = client.unwrap_or_else(|| self.http.clone());

        let mut assets = AssetMap::new();
        for reference in steps.iter().flat_map(|s| s.images.iter()) {
            if reference.starts_with("data:") {
                continue;
            }
            let file = asset_filename(reference);
            if assets.contains_key(&file) {
                continue;
            }
            let target = dir.join(&file);
            match locate(source, reference)? {
                Location::Remote(url) => {
                    let bytes = client
                        .get(&url)
                        .send()
                        .await?
                        .error_for_status()?
                        .bytes()
                        .await?;
                    tokio::fs::write(&target, &bytes).await?;
                    debug!(url = %url, file = %file, "Downloaded asset");
                }
                Location::Local(path) => {
                    tokio::fs::copy(&path, &target)
                        .await
                        .map_err(|e| format!("copying {}: {e}", path.display()))?;
                    debug!(path = %path.display(), file = %file, "Copied asset");
                }
            }
            assets.insert(file, reference.clone());
        }

        info!(dir = %dir.display(), assets = assets.len(), "Retrieved codelab assets");
        Ok(assets)
    }
}
