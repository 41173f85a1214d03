//! Codelab metadata records (`codelab.json`).
//!
//! Every published codelab directory carries one metadata record. It anchors the
//! codelab to its source document and remembers how it was last exported; the
//! update engine never infers any of this from the rendered output.
//!
//! On disk the record is a single flat JSON object: the fields of [`Meta`] and
//! [`Context`] side by side, the way older exports wrote it.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MetaError;

/// File name of the metadata record inside a codelab directory.
pub const META_FILENAME: &str = "codelab.json";

/// Output format assumed for records that predate the `format` field.
pub const DEFAULT_FORMAT: &str = "html";

/// Identity and descriptive metadata of a codelab, as declared by its source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authors: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub feedback: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

/// How and from where a codelab was exported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Source reference understood by the fetcher (doc id, URL or file path).
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub env: String,
    #[serde(default)]
    pub format: String,
    /// URL prefix used by web formats.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(default, rename = "mainga", skip_serializing_if = "String::is_empty")]
    pub main_ga: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// The full metadata record: [`Meta`] and [`Context`] flattened together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMeta {
    #[serde(flatten)]
    pub meta: Meta,
    #[serde(flatten)]
    pub context: Context,
}

/// Path of the metadata record for a codelab directory.
pub fn meta_path(dir: &Path) -> PathBuf {
    dir.join(META_FILENAME)
}

/// Reads and decodes a metadata record.
///
/// Records written before `format` existed get [`DEFAULT_FORMAT`].
pub async fn read_meta(path: &Path) -> Result<ContextMeta, MetaError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| MetaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut record: ContextMeta =
        serde_json::from_slice(&bytes).map_err(|source| MetaError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    if record.context.format.is_empty() {
        record.context.format = DEFAULT_FORMAT.to_string();
    }
    debug!(path = %path.display(), id = %record.meta.id, "Read codelab metadata");
    Ok(record)
}

/// Writes `record` to `dir/codelab.json`, replacing any previous record atomically.
pub fn write_meta(dir: &Path, record: &ContextMeta) -> Result<PathBuf, MetaError> {
    let path = meta_path(dir);
    let mut json = serde_json::to_vec_pretty(record).map_err(MetaError::Encode)?;
    json.push(b'\n');

    let write_err = |source| MetaError::Write {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&json).map_err(write_err)?;
    tmp.persist(&path).map_err(|e| write_err(e.error))?;
    Ok(path)
}
