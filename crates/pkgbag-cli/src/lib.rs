//! pkgbag - drive and inspect a node's package registry
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Replays cluster metadata snapshots through the same watcher queue a live
//! node uses, so package definitions can be checked before they are
//! published.
//!
//! # Snapshot files
//!
//! A snapshot is the JSON form of the cluster metadata. Only the
//! `packages` section is read; an optional top-level `version` sets the
//! metadata version of that snapshot.
//!
//! ```text
//! {
//!   "version": 5,
//!   "packages": {
//!     "pkgA": { "name": "pkgA", "version": "1.0",
//!               "file": { "id": "a.jar", "sig": "..." } }
//!   }
//! }
//! ```

pub mod cmd;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pkgbag")]
#[command(author, version, about = "pkgbag - signed plugin packages for a cluster node")]
pub struct Cli {
    /// Node configuration file (TOML). PKGBAG_* variables override it.
    #[arg(long, global = true, env = "PKGBAG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply metadata snapshots in order and report what each one loaded
    Sync {
        /// Snapshot files, oldest first
        #[arg(required = true)]
        snapshots: Vec<PathBuf>,
    },
    /// Show the packages of a snapshot and whether they would validate
    Inspect {
        /// Snapshot file
        snapshot: PathBuf,
    },
    /// Check one stored artifact against the trusted keys
    Verify {
        /// Artifact id in the file store
        artifact: String,
        /// Base64 Ed25519 signature
        signature: String,
    },
}
