//! Trusted key sources.
//!
//! Keys are re-read for every verification pass so rotations in the backing
//! store take effect without a restart.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use thiserror::Error;

/// Public key material by key id.
pub type TrustedKeys = BTreeMap<String, Vec<u8>>;

/// Errors raised by a [`KeyStore`].
#[derive(Error, Debug)]
pub enum KeyStoreError {
    /// The key directory could not be read.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Source of trusted public keys.
pub trait KeyStore: Send + Sync {
    /// Keys trusted for `purpose` (e.g. `exe`). An unknown purpose yields an
    /// empty map.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError`] if the backing store cannot be read.
    fn trusted_keys(&self, purpose: &str) -> Result<TrustedKeys, KeyStoreError>;
}

impl<T: KeyStore + ?Sized> KeyStore for Arc<T> {
    fn trusted_keys(&self, purpose: &str) -> Result<TrustedKeys, KeyStoreError> {
        (**self).trusted_keys(purpose)
    }
}

/// Keys stored as files: `<root>/<purpose>/<key id>`, each holding one
/// Base64-encoded public key.
#[derive(Debug, Clone)]
pub struct DirKeyStore {
    root: PathBuf,
}

impl DirKeyStore {
    /// Create a key store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl KeyStore for DirKeyStore {
    fn trusted_keys(&self, purpose: &str) -> Result<TrustedKeys, KeyStoreError> {
        let dir = self.root.join(purpose);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TrustedKeys::new()),
            Err(e) => return Err(e.into()),
        };

        // Only the directory listing itself can fail the pass; one bad key
        // file is skipped.
        let mut keys = TrustedKeys::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {e}", dir.display());
                    continue;
                }
            };
            let key_id = entry.file_name().to_string_lossy().into_owned();
            if key_id.starts_with('.') {
                continue;
            }
            match read_key(&entry) {
                Ok(Some(material)) => {
                    keys.insert(key_id, material);
                }
                Ok(None) => {}
                Err(reason) => {
                    tracing::warn!("Skipping key {key_id} in {}: {reason}", dir.display());
                }
            }
        }
        Ok(keys)
    }
}

fn read_key(entry: &std::fs::DirEntry) -> Result<Option<Vec<u8>>, String> {
    if !entry.file_type().map_err(|e| e.to_string())?.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(entry.path()).map_err(|e| e.to_string())?;
    base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map(Some)
        .map_err(|e| e.to_string())
}

/// In-memory key store, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyStore {
    by_purpose: HashMap<String, TrustedKeys>,
}

impl StaticKeyStore {
    /// Create an empty key store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `material` under `key_id` for `purpose`.
    pub fn with_key(
        mut self,
        purpose: impl Into<String>,
        key_id: impl Into<String>,
        material: impl Into<Vec<u8>>,
    ) -> Self {
        self.by_purpose
            .entry(purpose.into())
            .or_default()
            .insert(key_id.into(), material.into());
        self
    }
}

impl KeyStore for StaticKeyStore {
    fn trusted_keys(&self, purpose: &str) -> Result<TrustedKeys, KeyStoreError> {
        Ok(self.by_purpose.get(purpose).cloned().unwrap_or_default())
    }
}
