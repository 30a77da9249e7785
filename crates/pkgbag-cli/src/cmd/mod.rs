//! Subcommands and the helpers they share.

pub mod inspect;
pub mod sync;
pub mod verify;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use pkgbag_core::{DirKeyStore, LocalFileStore, NodeLoader, PackageConfig, PackageRegistry};
use serde_json::{Map, Value};

/// Node configuration: the file if given, then `PKGBAG_*` overrides.
pub fn load_config(path: Option<&Path>) -> Result<PackageConfig> {
    let config = match path {
        Some(path) => PackageConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
            .with_env(),
        None => PackageConfig::from_env(),
    };
    tracing::debug!("Using configuration {config:?}");
    Ok(config)
}

/// A snapshot file: its explicit metadata version, if any, and its
/// properties.
pub fn read_snapshot(path: &Path) -> Result<(Option<i64>, Map<String, Value>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in snapshot {}", path.display()))?;
    let Value::Object(properties) = value else {
        bail!("Snapshot {} is not a JSON object", path.display());
    };
    let version = properties
        .get("version")
        .map(|v| {
            v.as_i64()
                .with_context(|| format!("Snapshot {}: `version` must be an integer", path.display()))
        })
        .transpose()?;
    Ok((version, properties))
}

/// Registry wired to the on-disk store, key directory and instance
/// directory named by `config`.
pub fn open_registry(config: &PackageConfig) -> PackageRegistry {
    PackageRegistry::new(
        config,
        Arc::new(NodeLoader::new(&config.instance_dir)),
        Arc::new(LocalFileStore::from_config(config)),
        Arc::new(DirKeyStore::new(&config.keys_dir)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_snapshot_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, r#"{"version": 7, "packages": {}}"#).unwrap();
        let (version, props) = read_snapshot(&path).unwrap();
        assert_eq!(version, Some(7));
        assert!(props.contains_key("packages"));

        std::fs::write(&path, r#"{"packages": {}}"#).unwrap();
        assert_eq!(read_snapshot(&path).unwrap().0, None);
    }

    #[test]
    fn test_read_snapshot_rejects_non_objects() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(read_snapshot(&path).is_err());
        std::fs::write(&path, r#"{"version": "five"}"#).unwrap();
        assert!(read_snapshot(&path).is_err());
    }
}
