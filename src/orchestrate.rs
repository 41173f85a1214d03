//! Batch orchestration: updates every discovered codelab concurrently.
//!
//! This module drives a whole `update` invocation:
//!   - discovers codelab directories under the configured roots ([`crate::scan`])
//!   - fans one task per codelab out onto the runtime, capped by a semaphore
//!   - delays each task by a seeded random jitter below one second, so bursts of
//!     requests against a rate-limited source are spread out
//!   - fans results back in, exactly one per dispatched codelab, in completion order
//!
//! # Error Handling
//! Only discovery can fail the batch ([`BatchError`]). A codelab whose update
//! fails (or whose task panics) is recorded in the [`UpdateReport`]; no task is
//! ever cancelled because a sibling failed.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::UpdateConfig;
use crate::contract::Collaborators;
use crate::error::{BatchError, UpdateError};
use crate::meta::Meta;
use crate::scan::scan_paths;
use crate::update::{update_codelab, UpdateOptions};

/// Upper bound (exclusive) of the start delay, in milliseconds.
pub const MAX_JITTER_MS: u64 = 1000;

/// Source of per-codelab start delays.
pub struct Jitter {
    rng: Option<Mutex<StdRng>>,
}

impl Jitter {
    /// Delays drawn from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: Some(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Reproducible delays for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self { rng: None }
    }

    /// Next delay, uniform in `[0ms, MAX_JITTER_MS)`.
    pub fn next_delay(&self) -> Duration {
        let Some(rng) = &self.rng else {
            return Duration::ZERO;
        };
        let mut rng = match rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Duration::from_millis(rng.gen_range(0..MAX_JITTER_MS))
    }
}

impl From<Option<u64>> for Jitter {
    fn from(seed: Option<u64>) -> Self {
        seed.map_or_else(Jitter::from_entropy, Jitter::seeded)
    }
}

/// Outcome of a single codelab update.
#[derive(Debug)]
pub struct UnitReport {
    pub dir: PathBuf,
    pub result: Result<Meta, UpdateError>,
}

/// Outcome of a whole batch, in completion order.
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub units: Vec<UnitReport>,
}

impl UpdateReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&PathBuf, &Meta)> {
        self.units
            .iter()
            .filter_map(|u| u.result.as_ref().ok().map(|meta| (&u.dir, meta)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&PathBuf, &UpdateError)> {
        self.units
            .iter()
            .filter_map(|u| u.result.as_ref().err().map(|e| (&u.dir, e)))
    }
}

/// Updates every codelab in `dirs` and waits for all of them.
///
/// At most `concurrency` updates run at the same time (`None` or `0`: one slot
/// per codelab). Each update sleeps for a jitter delay before starting; delays
/// are drawn in `dirs` order before anything is dispatched.
pub async fn update_all(
    dirs: Vec<PathBuf>,
    options: &UpdateOptions,
    deps: &Collaborators,
    jitter: &Jitter,
    concurrency: Option<usize>,
) -> UpdateReport {
    let slots = concurrency
        .filter(|n| *n > 0)
        .unwrap_or(dirs.len())
        .max(1);
    let semaphore = Arc::new(Semaphore::new(slots));
    info!(codelabs = dirs.len(), slots, "[UPDATE] Dispatching codelab updates");

    let mut pending = FuturesUnordered::new();
    for dir in dirs {
        let delay = jitter.next_delay();
        let semaphore = Arc::clone(&semaphore);
        let options = options.clone();
        let deps = deps.clone();
        let task_dir = dir.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| UpdateError::Task(e.to_string()))?;
            update_codelab(&task_dir, &options, &deps).await
        });
        pending.push(async move {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(UpdateError::Task(e.to_string())),
            };
            UnitReport { dir, result }
        });
    }

    let mut report = UpdateReport::default();
    while let Some(unit) = pending.next().await {
        match &unit.result {
            Ok(meta) => info!(id = %meta.id, dir = %unit.dir.display(), "[UPDATE] ok"),
            Err(e) => error!(dir = %unit.dir.display(), error = %e, "[UPDATE][ERROR] Codelab update failed"),
        }
        report.units.push(unit);
    }
    report
}

/// Scans the configured roots and updates every codelab found.
///
/// Fails only if a root cannot be scanned or no codelab was found at all.
pub async fn run_update(
    config: &UpdateConfig,
    deps: &Collaborators,
    jitter: &Jitter,
) -> Result<UpdateReport, BatchError> {
    let roots = config.roots_or_default();
    let dirs = scan_paths(&roots).await?;
    if dirs.is_empty() {
        let roots = roots
            .iter()
            .map(|r| r.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        warn!(roots = %roots, "[UPDATE] No codelabs found");
        return Err(BatchError::NoCodelabs { roots });
    }

    let report = update_all(dirs, &config.options(), deps, jitter, config.concurrency).await;
    info!(
        succeeded = report.succeeded().count(),
        failed = report.failed().count(),
        "[UPDATE] Batch complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_below_one_second() {
        let jitter = Jitter::seeded(7);
        for _ in 0..10_000 {
            let delay = jitter.next_delay();
            assert!(delay < Duration::from_millis(MAX_JITTER_MS), "{delay:?}");
        }
    }

    #[test]
    fn same_seed_gives_same_delays() {
        let a = Jitter::seeded(42);
        let b = Jitter::seeded(42);
        let da: Vec<_> = (0..20).map(|_| a.next_delay()).collect();
        let db: Vec<_> = (0..20).map(|_| b.next_delay()).collect();
        assert_eq!(da, db);
    }

    #[test]
    fn disabled_jitter_is_zero() {
        assert_eq!(Jitter::none().next_delay(), Duration::ZERO);
    }
}
