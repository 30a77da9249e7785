//! Verify command

use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;
use pkgbag_core::{DirKeyStore, FileStore, KeyStore, LocalFileStore, PackageConfig, TrustVerifier};
use pkgbag_schema::ArtifactId;

/// Verify one artifact of the local store against the keys trusted for the
/// configured purpose.
pub fn verify(config: &PackageConfig, artifact: &str, signature: &str) -> Result<()> {
    let id = ArtifactId::new(artifact)?;
    let store = LocalFileStore::from_config(config);
    if !store.ensure_present(&id)? {
        bail!("Artifact {id} is not in {}", store.root().display());
    }

    let keys = DirKeyStore::new(&config.keys_dir)
        .trusted_keys(&config.key_purpose)
        .context("Failed to read trusted keys")?;
    let verifier = TrustVerifier::new(&keys);
    if verifier.is_empty() {
        bail!("No trusted public keys for purpose '{}'", config.key_purpose);
    }

    if verifier.verify(signature, store.open(&id)?) {
        println!("{} {id}", "valid".green());
        Ok(())
    } else {
        println!("{} {id}", "invalid".red());
        bail!("Invalid signature for artifact: {id}")
    }
}
