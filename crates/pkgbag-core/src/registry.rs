//! The package registry.
//!
//! Keeps exactly one loaded package per package name, in sync with the
//! `packages` section of the cluster metadata. Each update builds a new
//! immutable [`RegistrySnapshot`] and publishes it with a single atomic swap,
//! so readers never block and never observe a half-applied update. Loaders
//! of replaced or removed packages live on until their last reader drops
//! them.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use pkgbag_schema::{DescriptorError, PackageDescriptor, UNKNOWN_VERSION, parse_packages};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::PackageConfig;
use crate::keys::KeyStore;
use crate::listeners::ListenerRegistry;
use crate::loader::{LoaderError, NodeLoader, PackageLoader, ResourceLoader};
use crate::store::FileStore;
use crate::validate::PackageValidator;

/// Why one package of an update batch was not activated.
#[derive(Error, Debug)]
pub enum PackageLoadError {
    /// The package record is malformed.
    #[error("Invalid package definition: {0}")]
    Descriptor(#[from] DescriptorError),

    /// The package failed validation.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The loading context could not be built.
    #[error("Failed to load package: {0}")]
    Loader(#[from] LoaderError),
}

/// An active package: its descriptor and the loader built for it.
#[derive(Debug)]
pub struct LoadedPackage {
    descriptor: Arc<PackageDescriptor>,
    loader: Arc<PackageLoader>,
}

impl LoadedPackage {
    /// Descriptor the package was loaded from.
    pub fn descriptor(&self) -> &Arc<PackageDescriptor> {
        &self.descriptor
    }

    /// The package's isolated loader.
    pub fn loader(&self) -> &Arc<PackageLoader> {
        &self.loader
    }

    /// The loader as a generic loading capability.
    pub fn resource_loader(&self) -> ResourceLoader {
        ResourceLoader::Package(Arc::clone(&self.loader))
    }
}

/// Immutable view of every active package at one point in time.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    packages: HashMap<String, Arc<LoadedPackage>>,
}

impl RegistrySnapshot {
    /// Loaded package `name`, if active.
    pub fn get(&self, name: &str) -> Option<&Arc<LoadedPackage>> {
        self.packages.get(name)
    }

    /// Whether `name` is active.
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Active package names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.packages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of active packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// True if no package is active.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// What one update did.
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    /// Packages added or changed, in name order.
    pub touched: Vec<Arc<PackageDescriptor>>,
    /// Packages dropped because the snapshot no longer lists them.
    pub removed: Vec<String>,
    /// Packages that could not be activated. Their previous state, if any,
    /// is still active.
    pub failed: BTreeMap<String, PackageLoadError>,
}

impl UpdateOutcome {
    /// True if the update did not change the published state.
    pub fn is_noop(&self) -> bool {
        self.touched.is_empty() && self.removed.is_empty()
    }
}

/// Registry of the packages active on this node.
pub struct PackageRegistry {
    state: ArcSwap<RegistrySnapshot>,
    update_lock: Mutex<()>,
    processed_version: AtomicI64,
    verify_signatures: bool,
    node: Arc<NodeLoader>,
    store: Arc<dyn FileStore>,
    validator: PackageValidator,
    listeners: ListenerRegistry,
}

impl std::fmt::Debug for PackageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageRegistry")
            .field("packages", &self.state.load().names())
            .field("processed_version", &self.processed_version())
            .field("verify_signatures", &self.verify_signatures)
            .finish_non_exhaustive()
    }
}

impl PackageRegistry {
    /// Create an empty registry.
    ///
    /// The store and key store are the only collaborators loaders and
    /// validation get; packages never see the registry itself.
    pub fn new(
        config: &PackageConfig,
        node: Arc<NodeLoader>,
        store: Arc<dyn FileStore>,
        keys: Arc<dyn KeyStore>,
    ) -> Self {
        let validator = PackageValidator::new(config, keys, Arc::clone(&store));
        Self {
            state: ArcSwap::from_pointee(RegistrySnapshot::default()),
            update_lock: Mutex::new(()),
            processed_version: AtomicI64::new(UNKNOWN_VERSION),
            verify_signatures: config.verify_signatures,
            node,
            store,
            validator,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Handle a metadata change: update packages, then notify listeners of
    /// anything added or changed. Returns the touched descriptors.
    ///
    /// Updates are serialized. Listeners run on the calling thread and must
    /// not trigger another update synchronously.
    pub fn on_metadata_change(
        &self,
        properties: &Map<String, Value>,
        version: i64,
    ) -> Vec<Arc<PackageDescriptor>> {
        let _guard = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!("Cluster metadata changed, version {version}");

        let outcome = self.apply(properties, version);
        if !outcome.touched.is_empty() {
            self.listeners.notify(&outcome.touched);
        }
        self.processed_version.store(version, Ordering::Release);
        outcome.touched
    }

    /// Diff `properties` against the current state and publish the result,
    /// without notifying listeners.
    pub fn update_packages(&self, properties: &Map<String, Value>, version: i64) -> UpdateOutcome {
        let _guard = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.apply(properties, version)
    }

    fn apply(&self, properties: &Map<String, Value>, version: i64) -> UpdateOutcome {
        let mut outcome = UpdateOutcome::default();
        let parsed = match parse_packages(properties, version) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!("Ignoring packages at metadata version {version}: {e}");
                return outcome;
            }
        };
        let current = self.state.load_full();
        if parsed.is_empty() && current.is_empty() {
            return outcome;
        }

        for (name, e) in parsed.malformed {
            tracing::error!("Invalid package {name} at metadata version {version}: {e}");
            outcome.failed.insert(name, e.into());
        }

        // None marks a removal.
        let mut changes: BTreeMap<String, Option<PackageDescriptor>> = BTreeMap::new();
        for (name, descriptor) in parsed.descriptors {
            let unchanged = current
                .get(&name)
                .is_some_and(|p| p.descriptor.is_equivalent(&descriptor));
            if !unchanged {
                changes.insert(name, Some(descriptor));
            }
        }
        for name in current.packages.keys() {
            if !parsed.listed.contains(name) {
                changes.insert(name.clone(), None);
            }
        }
        if changes.is_empty() {
            return outcome;
        }

        let mut next = RegistrySnapshot::clone(&current);
        for (name, change) in changes {
            let Some(descriptor) = change else {
                tracing::info!("Package {name} removed");
                next.packages.remove(&name);
                outcome.removed.push(name);
                continue;
            };
            match self.load(descriptor) {
                Ok(package) => {
                    tracing::info!(
                        "Package {name} loaded at version {}",
                        package.descriptor.version()
                    );
                    outcome.touched.push(Arc::clone(&package.descriptor));
                    next.packages.insert(name, Arc::new(package));
                }
                Err(e) => {
                    tracing::error!("Package {name} not activated: {e}");
                    outcome.failed.insert(name, e);
                }
            }
        }

        if !outcome.is_noop() {
            self.state.store(Arc::new(next));
        }
        outcome
    }

    fn load(&self, descriptor: PackageDescriptor) -> Result<LoadedPackage, PackageLoadError> {
        let store = self.store.as_ref();
        let node = Arc::clone(&self.node);
        let loader = if self.verify_signatures {
            let report = self.validator.check(&descriptor);
            if !report.is_valid() {
                return Err(PackageLoadError::Validation(report.errors));
            }
            // Only the bytes whose signatures were checked may be loaded.
            PackageLoader::load_verified(&descriptor, store, node, &report.digests)?
        } else {
            let errors = self.validator.check_enabled();
            if !errors.is_empty() {
                return Err(PackageLoadError::Validation(errors));
            }
            PackageLoader::load(&descriptor, store, node)?
        };
        Ok(LoadedPackage {
            descriptor: Arc::new(descriptor),
            loader: Arc::new(loader),
        })
    }

    /// Current state. Stays consistent however long the caller holds it.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.state.load_full()
    }

    /// Metadata version at which the active `package` was read, or `-1`.
    pub fn metadata_version(&self, package: &str) -> i64 {
        self.state
            .load()
            .get(package)
            .map_or(UNKNOWN_VERSION, |p| p.descriptor.observed_version())
    }

    /// Last metadata version handled by [`PackageRegistry::on_metadata_change`].
    pub fn processed_version(&self) -> i64 {
        self.processed_version.load(Ordering::Acquire)
    }

    /// Descriptor of the active `package`.
    pub fn package_info(&self, package: &str) -> Option<Arc<PackageDescriptor>> {
        self.state
            .load()
            .get(package)
            .map(|p| Arc::clone(&p.descriptor))
    }

    /// Names of the active packages, sorted.
    pub fn names(&self) -> Vec<String> {
        self.state
            .load()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Loader for `package`, or the node default when `package` is absent
    /// or not active.
    pub fn resource_loader(&self, package: Option<&str>) -> ResourceLoader {
        package
            .and_then(|name| self.state.load().get(name).map(|p| p.resource_loader()))
            .unwrap_or_else(|| ResourceLoader::Node(Arc::clone(&self.node)))
    }

    /// Build `type_name` through [`PackageRegistry::resource_loader`] and
    /// check that it is a `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`LoaderError`] if the type cannot be resolved or built, or
    /// is not a `T`.
    pub fn new_instance<T: Any>(
        &self,
        type_name: &str,
        package: Option<&str>,
    ) -> Result<T, LoaderError> {
        self.resource_loader(package).new_instance(type_name)
    }

    /// Listener registry notified after each update.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// The node-wide default loader.
    pub fn node_loader(&self) -> &Arc<NodeLoader> {
        &self.node
    }

    /// Validator used before activation.
    pub fn validator(&self) -> &PackageValidator {
        &self.validator
    }
}
