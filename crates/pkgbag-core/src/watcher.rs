//! Watcher actor - the single queue metadata changes go through.
//!
//! Change notifications are delivered to one background task, which applies
//! them to the registry one at a time and in order. Fetching and verifying
//! artifacts is blocking I/O, so each update runs on the blocking pool rather
//! than on the task that delivered the notification.

use std::fmt;
use std::sync::Arc;

use pkgbag_schema::PackageDescriptor;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::registry::PackageRegistry;

/// Errors returned by a [`WatcherHandle`].
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The watcher task is gone.
    #[error("Watcher actor stopped")]
    ActorDied,
}

/// Events handled by the watcher task.
pub enum WatcherEvent {
    /// The cluster metadata changed.
    Changed {
        /// Metadata-store version of the snapshot.
        version: i64,
        /// The whole snapshot.
        properties: Map<String, Value>,
        /// Receives the touched packages once applied.
        resp: Option<oneshot::Sender<Vec<Arc<PackageDescriptor>>>>,
    },
    /// Stop after the events already queued.
    Shutdown,
}

impl fmt::Debug for WatcherEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changed { version, .. } => f
                .debug_struct("Changed")
                .field("version", version)
                .finish_non_exhaustive(),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Cloneable handle used to feed the watcher.
#[derive(Clone)]
pub struct WatcherHandle {
    sender: mpsc::Sender<WatcherEvent>,
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHandle").finish_non_exhaustive()
    }
}

impl WatcherHandle {
    /// Spawn the watcher task on the current runtime.
    ///
    /// The join handle resolves to the number of snapshots applied, once
    /// every handle is dropped or [`WatcherHandle::shutdown`] is processed.
    pub fn spawn(registry: Arc<PackageRegistry>, capacity: usize) -> (Self, JoinHandle<usize>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run_watcher_loop(registry, receiver));
        (Self { sender }, task)
    }

    /// Queue a snapshot without waiting for it to be applied.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::ActorDied`] if the watcher has stopped.
    pub async fn notify(&self, version: i64, properties: Map<String, Value>) -> Result<(), WatcherError> {
        self.sender
            .send(WatcherEvent::Changed {
                version,
                properties,
                resp: None,
            })
            .await
            .map_err(|_| WatcherError::ActorDied)
    }

    /// Queue a snapshot and wait until it has been applied. Returns the
    /// touched packages.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::ActorDied`] if the watcher stops first.
    pub async fn apply(
        &self,
        version: i64,
        properties: Map<String, Value>,
    ) -> Result<Vec<Arc<PackageDescriptor>>, WatcherError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WatcherEvent::Changed {
                version,
                properties,
                resp: Some(tx),
            })
            .await
            .map_err(|_| WatcherError::ActorDied)?;
        rx.await.map_err(|_| WatcherError::ActorDied)
    }

    /// Ask the watcher to stop once the queued events are applied.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::ActorDied`] if the watcher already stopped.
    pub async fn shutdown(&self) -> Result<(), WatcherError> {
        self.sender
            .send(WatcherEvent::Shutdown)
            .await
            .map_err(|_| WatcherError::ActorDied)
    }
}

async fn run_watcher_loop(
    registry: Arc<PackageRegistry>,
    mut receiver: mpsc::Receiver<WatcherEvent>,
) -> usize {
    let mut applied = 0;
    while let Some(event) = receiver.recv().await {
        let WatcherEvent::Changed {
            version,
            properties,
            resp,
        } = event
        else {
            break;
        };

        let registry = Arc::clone(&registry);
        let update =
            tokio::task::spawn_blocking(move || registry.on_metadata_change(&properties, version));
        match update.await {
            Ok(touched) => {
                applied += 1;
                if let Some(resp) = resp {
                    // The requester may have given up waiting.
                    let _ = resp.send(touched);
                }
            }
            Err(e) => tracing::error!("Package update for metadata version {version} failed: {e}"),
        }
    }
    tracing::debug!("Watcher stopped after {applied} updates");
    applied
}
