//! Node configuration for package support.
//!
//! Read once at process start, then passed by value to the validator and
//! the registry. Nothing here is global.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::paths;

/// Errors that can occur while loading a [`PackageConfig`] from disk.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings that govern package loading on this node.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PackageConfig {
    /// Administrative toggle. When off, no package is ever activated.
    pub enabled: bool,
    /// Verify artifact signatures before building a loading context.
    pub verify_signatures: bool,
    /// Key purpose used to look up trusted keys (e.g. `exe`).
    pub key_purpose: String,
    /// Local artifact cache.
    pub store_dir: PathBuf,
    /// Shared store artifacts are fetched from, if any.
    pub upstream_dir: Option<PathBuf>,
    /// Root of the trusted key directories.
    pub keys_dir: PathBuf,
    /// Instance directory served by the node-wide default loader.
    pub instance_dir: PathBuf,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            verify_signatures: true,
            key_purpose: DEFAULT_KEY_PURPOSE.to_string(),
            store_dir: paths::filestore_path(),
            upstream_dir: None,
            keys_dir: paths::keys_path(),
            instance_dir: paths::instance_path(),
        }
    }
}

/// Key purpose that signs executable package artifacts.
pub const DEFAULT_KEY_PURPOSE: &str = "exe";

impl PackageConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Parse configuration from a TOML document. Missing keys take their
    /// default values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document does not match the schema.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its content is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Override fields from `PKGBAG_*` environment variables.
    pub fn with_env(mut self) -> Self {
        if let Some(v) = env_flag("PKGBAG_ENABLE_PACKAGES") {
            self.enabled = v;
        }
        if let Some(v) = env_flag("PKGBAG_VERIFY_SIGNATURES") {
            self.verify_signatures = v;
        }
        if let Ok(v) = std::env::var("PKGBAG_KEY_PURPOSE") {
            self.key_purpose = v;
        }
        if let Ok(v) = std::env::var("PKGBAG_STORE_DIR") {
            self.store_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PKGBAG_UPSTREAM_DIR") {
            self.upstream_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("PKGBAG_KEYS_DIR") {
            self.keys_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PKGBAG_INSTANCE_DIR") {
            self.instance_dir = PathBuf::from(v);
        }
        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
