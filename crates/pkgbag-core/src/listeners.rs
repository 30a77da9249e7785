//! Package update listeners.
//!
//! Notifications are pushes of the touched descriptors only. Listeners that
//! need current state must query the registry again.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use pkgbag_schema::PackageDescriptor;

/// Callback invoked with the packages touched by an update.
pub type PackageListener =
    Arc<dyn Fn(&[Arc<PackageDescriptor>]) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`PackageListeners::add`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// An ordered set of listeners.
pub struct PackageListeners {
    label: String,
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerHandle, PackageListener)>>,
}

impl std::fmt::Debug for PackageListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageListeners")
            .field("label", &self.label)
            .field("len", &self.len())
            .finish()
    }
}

impl PackageListeners {
    /// Create an empty set; `label` names it in logs.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            next_id: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Label used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Register a listener. Listeners run in registration order.
    ///
    /// A listener runs on the updating thread while the registry's update
    /// lock is held. A panic is caught and counted as a failure, but only
    /// when panics unwind: under `panic = "abort"` it ends the process.
    pub fn add<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&[Arc<PackageDescriptor>]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handle = ListenerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((handle, Arc::new(listener)));
        handle
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn remove(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(h, _)| *h != handle);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener with `touched`. A failing listener is logged
    /// and does not stop the rest. Returns the number of failures.
    pub fn packages_updated(&self, touched: &[Arc<PackageDescriptor>]) -> usize {
        // Snapshot so listeners may add or remove listeners while running.
        let listeners: Vec<PackageListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        let mut failures = 0;
        for listener in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(touched))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::error!("Package listener in {} failed: {e:#}", self.label);
                }
                Err(_) => {
                    failures += 1;
                    tracing::error!("Package listener in {} panicked", self.label);
                }
            }
        }
        failures
    }
}

/// Per-unit listener sets plus the process-wide one.
#[derive(Debug)]
pub struct ListenerRegistry {
    units: RwLock<BTreeMap<String, Arc<PackageListeners>>>,
    global: Arc<PackageListeners>,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self {
            units: RwLock::new(BTreeMap::new()),
            global: Arc::new(PackageListeners::new("node")),
        }
    }
}

impl ListenerRegistry {
    /// Create a registry with no units.
    pub fn new() -> Self {
        Self::default()
    }

    /// Listener set of unit `name`, created on first use.
    pub fn unit(&self, name: &str) -> Arc<PackageListeners> {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            units
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(PackageListeners::new(name))),
        )
    }

    /// Drop unit `name` and all its listeners. Returns false if unknown.
    pub fn remove_unit(&self, name: &str) -> bool {
        self.units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Names of the registered units.
    pub fn unit_names(&self) -> Vec<String> {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// The process-wide listener set, notified after every unit.
    pub fn global(&self) -> &Arc<PackageListeners> {
        &self.global
    }

    /// Notify every unit, then the process-wide set. Returns the total
    /// number of listener failures.
    pub fn notify(&self, touched: &[Arc<PackageDescriptor>]) -> usize {
        let units: Vec<Arc<PackageListeners>> = self
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let names: Vec<&str> = touched.iter().map(|d| d.name()).collect();
        tracing::info!(
            "{} units being notified of updated packages: {names:?}",
            units.len()
        );

        let mut failures = 0;
        for unit in units {
            failures += unit.packages_updated(touched);
        }
        failures + self.global.packages_updated(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgbag_schema::{ArtifactId, ArtifactRef};
    use std::sync::Mutex;

    fn touched(name: &str) -> Vec<Arc<PackageDescriptor>> {
        let artifact = ArtifactRef::new(ArtifactId::new("a.jar").unwrap(), "S");
        vec![Arc::new(
            PackageDescriptor::new(name, "1", None, vec![artifact], 1).unwrap(),
        )]
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let set = PackageListeners::new("core1");
        let seen = Arc::new(Mutex::new(Vec::new()));

        set.add(|_| anyhow::bail!("boom"));
        let sink = Arc::clone(&seen);
        set.add(move |pkgs| {
            sink.lock().unwrap().extend(pkgs.iter().map(|d| d.name().to_string()));
            Ok(())
        });

        assert_eq!(set.packages_updated(&touched("pkgA")), 1);
        assert_eq!(*seen.lock().unwrap(), ["pkgA"]);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(Mutex::new(0));

        registry.unit("core1").add(|_| panic!("listener bug"));
        for unit in ["core2", "core3"] {
            let counter = Arc::clone(&hits);
            registry.unit(unit).add(move |_| {
                *counter.lock().unwrap() += 1;
                Ok(())
            });
        }
        let counter = Arc::clone(&hits);
        registry.global().add(move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        assert_eq!(registry.notify(&touched("pkgA")), 1);
        assert_eq!(*hits.lock().unwrap(), 3);
    }

    #[test]
    fn test_remove_listener() {
        let set = PackageListeners::new("core1");
        let handle = set.add(|_| Ok(()));
        assert_eq!(set.len(), 1);
        assert!(set.remove(handle));
        assert!(!set.remove(handle));
        assert!(set.is_empty());
    }

    #[test]
    fn test_units_notified_before_global() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&order);
        registry.global().add(move |_| {
            log.lock().unwrap().push("global");
            Ok(())
        });
        for unit in ["core1", "core2"] {
            let log = Arc::clone(&order);
            registry.unit(unit).add(move |_| {
                log.lock().unwrap().push("unit");
                Ok(())
            });
        }

        assert_eq!(registry.notify(&touched("pkgA")), 0);
        assert_eq!(*order.lock().unwrap(), ["unit", "unit", "global"]);
    }

    #[test]
    fn test_removed_unit_is_not_notified() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        registry.unit("core1").add(move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });
        assert!(registry.remove_unit("core1"));
        registry.notify(&touched("pkgA"));
        assert_eq!(*hits.lock().unwrap(), 0);
        assert!(registry.unit_names().is_empty());
    }
}
