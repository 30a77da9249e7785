//! Package validation: the admin toggle, trusted keys, then every artifact's
//! signature.

use std::io::Read;
use std::sync::Arc;

use pkgbag_schema::{ArtifactRef, PackageDescriptor};

use crate::config::PackageConfig;
use crate::keys::KeyStore;
use crate::loader::ArtifactDigests;
use crate::store::{FileStore, StoreError};
use crate::verify::{TrustVerifier, sha256_hex};

/// Error reported for every package while package support is switched off.
pub const DISABLED_MESSAGE: &str =
    "Package loading is disabled on this node (start with PKGBAG_ENABLE_PACKAGES=true)";

/// Result of [`PackageValidator::check`].
#[derive(Debug, Default)]
pub struct Validation {
    /// Problems found. Empty means the package may load.
    pub errors: Vec<String>,
    /// SHA-256 of every artifact that passed, taken over the exact bytes
    /// whose signature was checked.
    pub digests: ArtifactDigests,
}

impl Validation {
    /// True if no problem was found.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks descriptors before their code is allowed to load.
pub struct PackageValidator {
    enabled: bool,
    key_purpose: String,
    keys: Arc<dyn KeyStore>,
    store: Arc<dyn FileStore>,
}

impl std::fmt::Debug for PackageValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageValidator")
            .field("enabled", &self.enabled)
            .field("key_purpose", &self.key_purpose)
            .finish_non_exhaustive()
    }
}

impl PackageValidator {
    /// Create a validator. Only `enabled` and `key_purpose` are taken from
    /// `config`.
    pub fn new(config: &PackageConfig, keys: Arc<dyn KeyStore>, store: Arc<dyn FileStore>) -> Self {
        Self {
            enabled: config.enabled,
            key_purpose: config.key_purpose.clone(),
            keys,
            store,
        }
    }

    /// The admin toggle alone: empty when packages may load.
    pub fn check_enabled(&self) -> Vec<String> {
        if self.enabled {
            Vec::new()
        } else {
            vec![DISABLED_MESSAGE.to_string()]
        }
    }

    /// Validate `descriptor`. An empty list means the package may load.
    ///
    /// Stops at the first failed precondition (disabled node, no trusted
    /// keys). Past those, every artifact is checked and each bad one adds
    /// its own error.
    pub fn validate(&self, descriptor: &PackageDescriptor) -> Vec<String> {
        self.check(descriptor).errors
    }

    /// Like [`PackageValidator::validate`], also recording the digest of each
    /// verified artifact so the loader can refuse bytes that changed since.
    pub fn check(&self, descriptor: &PackageDescriptor) -> Validation {
        let mut report = Validation {
            errors: self.check_enabled(),
            ..Validation::default()
        };
        if !report.is_valid() {
            return report;
        }

        let keys = match self.keys.trusted_keys(&self.key_purpose) {
            Ok(keys) => keys,
            Err(e) => {
                report.errors.push(format!(
                    "No trusted public keys for purpose '{}': {e}",
                    self.key_purpose
                ));
                return report;
            }
        };
        if keys.is_empty() {
            report.errors.push(format!(
                "No trusted public keys for purpose '{}'",
                self.key_purpose
            ));
            return report;
        }

        let verifier = TrustVerifier::new(&keys);
        for artifact in descriptor.artifacts() {
            match self.verify_artifact(&verifier, artifact) {
                Ok(Some(digest)) => {
                    report.digests.insert(artifact.id.clone(), digest);
                }
                Ok(None) => report
                    .errors
                    .push(format!("Invalid signature for artifact: {}", artifact.id)),
                Err(e) => report
                    .errors
                    .push(format!("Unable to read artifact {}: {e}", artifact.id)),
            }
        }
        report
    }

    /// Digest of the artifact if its signature is valid.
    fn verify_artifact(
        &self,
        verifier: &TrustVerifier,
        artifact: &ArtifactRef,
    ) -> Result<Option<String>, StoreError> {
        if !self.store.ensure_present(&artifact.id)? {
            return Err(StoreError::NotFound(artifact.id.clone()));
        }
        let mut bytes = Vec::new();
        self.store.open(&artifact.id)?.read_to_end(&mut bytes)?;
        Ok(verifier
            .verify_bytes(&artifact.sig, &bytes)
            .then(|| sha256_hex(&bytes)))
    }
}
