//! pkgbag core - signed plugin packages for a cluster node.
//!
//! # Architecture
//!
//! - **Registry**: [`PackageRegistry`] mirrors the `packages` section of the
//!   cluster metadata. Updates diff against the current
//!   [`RegistrySnapshot`] and publish a new one with a single atomic swap.
//! - **Trust**: [`PackageValidator`] checks every artifact's Ed25519
//!   signature against the keys a [`KeyStore`] trusts.
//! - **Isolation**: each package gets its own [`PackageLoader`]; type names
//!   resolve only inside that package's artifacts.
//! - **Watcher**: [`WatcherHandle`] serializes change notifications onto one
//!   background task.

pub mod config;
pub mod keys;
pub mod listeners;
pub mod loader;
pub mod paths;
pub mod registry;
pub mod store;
pub mod validate;
pub mod verify;
pub mod watcher;

pub use config::PackageConfig;
pub use keys::{DirKeyStore, KeyStore, StaticKeyStore, TrustedKeys};
pub use listeners::{ListenerHandle, ListenerRegistry, PackageListeners};
pub use loader::{ArtifactDigests, LoaderError, NodeLoader, PackageLoader, ResourceLoader};
pub use registry::{LoadedPackage, PackageLoadError, PackageRegistry, RegistrySnapshot, UpdateOutcome};
pub use store::{FileStore, LocalFileStore, StoreError};
pub use validate::{PackageValidator, Validation};
pub use verify::TrustVerifier;
pub use watcher::WatcherHandle;

pub use pkgbag_schema as schema;
