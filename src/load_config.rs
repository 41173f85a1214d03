//! `load_config`: optional YAML settings file for `claat-update update`.
//!
//! Every key is optional and mirrors a CLI flag; flags given on the command line
//! win over the file. Unknown keys are rejected so typos do not silently fall
//! back to defaults.
//!
//! ```yaml
//! roots: [codelabs, archive]
//! prefix: https://storage.googleapis.com
//! ga: UA-49880327-14
//! concurrency: 8
//! seed: 42
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use tracing::{error, info};

use crate::config::UpdateConfig;

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    #[serde(default)]
    pub roots: Vec<PathBuf>,
    pub prefix: Option<String>,
    pub ga: Option<String>,
    pub concurrency: Option<usize>,
    pub seed: Option<u64>,
}

impl FileSettings {
    /// Fills every setting `flags` leaves unset from the file.
    pub fn merge_under(self, flags: UpdateConfig) -> UpdateConfig {
        UpdateConfig {
            roots: if flags.roots.is_empty() {
                self.roots
            } else {
                flags.roots
            },
            prefix: flags.prefix.or(self.prefix),
            global_ga: flags.global_ga.or(self.ga),
            concurrency: flags.concurrency.or(self.concurrency),
            seed: flags.seed.or(self.seed),
        }
    }
}

/// Loads a settings file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileSettings> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading settings from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read settings file");
            return Err(anyhow::anyhow!(
                "Failed to read settings file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid, empty settings file.
    if content.trim().is_empty() {
        return Ok(FileSettings::default());
    }

    match serde_yaml::from_str::<FileSettings>(&content) {
        Ok(settings) => {
            info!(config_path = ?path_ref, "Parsed settings YAML successfully");
            Ok(settings)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse settings YAML");
            Err(anyhow::anyhow!("Failed to parse settings YAML: {e}"))
        }
    }
}
