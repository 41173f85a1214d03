#![doc = "claat-update: republishing engine for exported codelabs."]

//! Re-fetches every previously exported codelab in a workspace, writes it again
//! and removes whatever the new export made stale.
//!
//! - [`scan`] finds codelab directories, [`orchestrate`] updates them all concurrently
//! - [`update`] is the per-codelab pipeline, [`reconcile`] its cleanup step
//! - [`contract`] holds the collaborator traits; [`fetch`], [`assets`] and
//!   [`writer`] are their default implementations

pub mod assets;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod fetch;
pub mod load_config;
pub mod meta;
pub mod orchestrate;
pub mod parse;
pub mod reconcile;
pub mod scan;
pub mod update;
pub mod writer;
