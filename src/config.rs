use std::path::PathBuf;

use tracing::{debug, info};

use crate::update::UpdateOptions;

/// Settings of one `update` invocation, after merging the settings file and CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Directories to scan for codelabs. Empty means the current directory.
    pub roots: Vec<PathBuf>,
    pub prefix: Option<String>,
    pub global_ga: Option<String>,
    /// Maximum number of codelabs updated at once; `None` means no cap.
    pub concurrency: Option<usize>,
    /// Seed for the start jitter; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl UpdateConfig {
    pub fn roots_or_default(&self) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.roots.clone()
        }
    }

    pub fn options(&self) -> UpdateOptions {
        UpdateOptions {
            prefix: self.prefix.clone(),
            global_ga: self.global_ga.clone(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            roots = self.roots_or_default().len(),
            prefix = self.prefix.as_deref().unwrap_or(""),
            concurrency = ?self.concurrency,
            seeded = self.seed.is_some(),
            "Loaded update config"
        );
        debug!(?self, "Update config loaded (full debug)");
    }
}
