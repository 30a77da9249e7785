//! Sync command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use pkgbag_core::{PackageConfig, WatcherHandle};

use super::{open_registry, read_snapshot};

/// Feed `snapshots` through the watcher queue, oldest first.
pub async fn sync(config: &PackageConfig, snapshots: &[PathBuf]) -> Result<()> {
    let registry = Arc::new(open_registry(config));
    let (watcher, task) = WatcherHandle::spawn(Arc::clone(&registry), snapshots.len());

    for (position, path) in (1_i64..).zip(snapshots) {
        let (version, properties) = read_snapshot(path)?;
        let version = version.unwrap_or(position);
        let touched = watcher
            .apply(version, properties)
            .await
            .context("Package watcher stopped unexpectedly")?;

        println!("{} (metadata version {version})", path.display().to_string().bold());
        if touched.is_empty() {
            println!("  {}", "no changes".dark_grey());
        }
        for descriptor in &touched {
            println!(
                "  {} {} {}",
                "loaded".green(),
                descriptor.name(),
                descriptor.version().dark_grey()
            );
        }
    }

    watcher.shutdown().await?;
    let applied = task.await?;
    tracing::debug!("Applied {applied} snapshots");

    let active = registry.names();
    if active.is_empty() {
        println!("No active packages");
    } else {
        println!("Active: {}", active.join(", "));
    }
    Ok(())
}
