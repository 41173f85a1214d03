//! # contract: collaborator interfaces of the update engine
//!
//! The update pipeline never parses, downloads or renders anything itself. It
//! drives four collaborators through the traits below:
//!
//! - [`SourceFetcher`]: resolves a source reference into a parsed codelab
//! - [`ClientFactory`]: builds an authenticated HTTP client for Drive-hosted sources
//! - [`AssetRetriever`]: puts every image a codelab references into its asset dir
//! - [`OutputWriter`]: persists the rendered codelab and its metadata record
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; with the default `test-export-mocks`
//!   feature the generated `Mock*` types are exported so integration tests can
//!   drive the pipeline deterministically.
//!
//! ## Errors
//! - Collaborators return the boxed [`BoxError`]; the pipeline wraps it into the
//!   matching [`crate::error::UpdateError`] variant.
//!
//! Default implementations live in [`crate::fetch`], [`crate::assets`] and
//! [`crate::writer`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Captures;

#[allow(unused_imports)]
use mockall::{automock, predicate::*};

pub use crate::error::BoxError;
use crate::meta::{ContextMeta, Meta};
use crate::parse::image_regex;

/// Asset file name (as stored on disk) → the image reference it was retrieved from.
///
/// The key set is the keep-set used when orphaned assets are cleaned up.
pub type AssetMap = BTreeMap<String, String>;

/// Where a source document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A Google Doc, fetched through the Drive API.
    GoogleDoc,
    /// A markdown file, local or remote.
    Markdown,
}

impl SourceKind {
    /// Whether assets of this source can only be retrieved with an authenticated client.
    pub fn requires_auth(self) -> bool {
        matches!(self, SourceKind::GoogleDoc)
    }
}

/// One step of a codelab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    pub title: String,
    pub body: String,
    /// Image references in order of appearance, as they occur in `body`.
    pub images: Vec<String>,
}

/// A parsed codelab document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codelab {
    pub meta: Meta,
    pub steps: Vec<Step>,
}

impl Codelab {
    /// Points every image reference that was retrieved as an asset at its
    /// on-disk copy under `asset_dir_name`.
    pub fn rewrite_images(&mut self, assets: &AssetMap, asset_dir_name: &str) {
        let by_source: BTreeMap<&str, &str> = assets
            .iter()
            .map(|(file, source)| (source.as_str(), file.as_str()))
            .collect();
        for step in &mut self.steps {
            let body = image_regex().replace_all(&step.body, |caps: &Captures| {
                relink(caps, &by_source, asset_dir_name)
            });
            step.body = body.into_owned();
            for image in &mut step.images {
                if let Some(file) = by_source.get(image.as_str()) {
                    *image = format!("{asset_dir_name}/{file}");
                }
            }
        }
    }
}

/// Rewrites the link target of one image match, leaving alt text and title as is.
fn relink(caps: &Captures, by_source: &BTreeMap<&str, &str>, asset_dir_name: &str) -> String {
    let whole = &caps[0];
    let Some(target) = caps.get(1) else {
        return whole.to_string();
    };
    let Some(file) = by_source.get(target.as_str()) else {
        return whole.to_string();
    };
    let offset = caps.get(0).map_or(0, |m| m.start());
    format!(
        "{}{asset_dir_name}/{file}{}",
        &whole[..target.start() - offset],
        &whole[target.end() - offset..]
    )
}

/// Result of fetching and parsing a source reference.
#[derive(Debug, Clone)]
pub struct ParsedCodelab {
    pub codelab: Codelab,
    /// Last modification time of the source document.
    pub modified: DateTime<Utc>,
    pub kind: SourceKind,
}

/// Resolves a source reference into a parsed codelab.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<ParsedCodelab, BoxError>;
}

/// Builds the authenticated client used for Drive-hosted sources.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn new_client(&self) -> Result<reqwest::Client, BoxError>;
}

/// Retrieves the images referenced by `steps` into `dir`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AssetRetriever: Send + Sync {
    /// Returns the map of asset files now present in `dir` that the steps reference.
    ///
    /// `client` is set when the source requires authentication.
    async fn slurp(
        &self,
        client: Option<reqwest::Client>,
        source: &str,
        dir: &Path,
        steps: &[Step],
    ) -> Result<AssetMap, BoxError>;
}

/// Persists a rendered codelab together with its metadata record.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait OutputWriter: Send + Sync {
    async fn write(
        &self,
        dir: &Path,
        codelab: &Codelab,
        record: &ContextMeta,
    ) -> Result<(), BoxError>;
}

/// The collaborators one update run works with, shared by every unit.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn SourceFetcher>,
    pub clients: Arc<dyn ClientFactory>,
    pub assets: Arc<dyn AssetRetriever>,
    pub writer: Arc<dyn OutputWriter>,
}
