//! CLI glue for `claat-update`: argument parsing, settings merge and reporting.
//!
//! All update logic lives in the library modules; this module wires the default
//! collaborators together and turns the batch outcome into process output.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::assets::FsAssetRetriever;
use crate::config::UpdateConfig;
use crate::contract::{ClientFactory, Collaborators};
use crate::fetch::{MarkdownFetcher, TokenClientFactory};
use crate::load_config::load_config;
use crate::orchestrate::{run_update, Jitter};
use crate::writer::FsOutputWriter;

/// CLI for claat-update: republish previously exported codelabs.
#[derive(Parser)]
#[clap(
    name = "claat-update",
    version,
    about = "Re-export every codelab in a workspace from its source and remove stale files"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Update all codelabs found under the given directories (default: current directory)
    Update {
        /// Directories to scan for codelab.json files
        roots: Vec<PathBuf>,
        /// URL prefix for web formats, replaces the stored prefix
        #[clap(long)]
        prefix: Option<String>,
        /// Analytics id applied to every codelab, replaces the stored one
        #[clap(long)]
        ga: Option<String>,
        /// Maximum number of codelabs updated at once
        #[clap(long)]
        concurrency: Option<usize>,
        /// Seed for the randomized start delay
        #[clap(long)]
        seed: Option<u64>,
        /// Optional YAML settings file; flags take precedence
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Collaborators backed by the default fetcher, asset retriever and writer.
pub fn default_collaborators() -> Collaborators {
    let clients: Arc<dyn ClientFactory> = Arc::new(TokenClientFactory::from_env());
    Collaborators {
        fetcher: Arc::new(MarkdownFetcher::new(Arc::clone(&clients))),
        clients,
        assets: Arc::new(FsAssetRetriever::new()),
        writer: Arc::new(FsOutputWriter),
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Update {
            roots,
            prefix,
            ga,
            concurrency,
            seed,
            config,
        } => {
            let flags = UpdateConfig {
                roots,
                prefix,
                global_ga: ga,
                concurrency,
                seed,
            };
            let config = match config {
                Some(path) => load_config(path)?.merge_under(flags),
                None => flags,
            };
            config.trace_loaded();

            let deps = default_collaborators();
            let jitter = Jitter::from(config.seed);
            let report = run_update(&config, &deps, &jitter).await?;

            for (dir, err) in report.failed() {
                eprintln!("{}: {}", dir.display(), err);
            }
            for (_, meta) in report.succeeded() {
                println!("ok\t{}", meta.id);
            }
            tracing::info!(command = "update", units = report.units.len(), "Update complete");
            Ok(())
        }
    }
}
