//! Default on-disk locations.

use dirs::home_dir;
use std::path::PathBuf;

/// Returns the pkgbag home directory, or None if the user's home cannot be resolved.
pub fn try_pkgbag_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("PKGBAG_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".pkgbag"))
}

/// Returns the pkgbag home directory (`~/.pkgbag`).
///
/// Falls back to `.pkgbag` in the working directory when neither
/// `PKGBAG_HOME` nor the user's home directory is available.
pub fn pkgbag_home() -> PathBuf {
    try_pkgbag_home().unwrap_or_else(|| PathBuf::from(".pkgbag"))
}

/// Local artifact cache: ~/.pkgbag/filestore
pub fn filestore_path() -> PathBuf {
    pkgbag_home().join("filestore")
}

/// Trusted public keys, one directory per purpose: ~/.pkgbag/keys
pub fn keys_path() -> PathBuf {
    pkgbag_home().join("keys")
}

/// Node instance directory served by the default loader: ~/.pkgbag/instance
pub fn instance_path() -> PathBuf {
    pkgbag_home().join("instance")
}
