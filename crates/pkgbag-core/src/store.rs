//! Artifact file store.
//!
//! The distributed file store is an external collaborator; this module
//! defines the interface the core needs from it and a directory-backed
//! implementation that pulls missing artifacts from a shared upstream
//! directory.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkgbag_schema::ArtifactId;
use thiserror::Error;

use crate::config::PackageConfig;

/// Errors raised by a [`FileStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// The artifact is not present in local storage.
    #[error("Artifact not found: {0}")]
    NotFound(ArtifactId),

    /// Local storage could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Access to package artifacts by id.
pub trait FileStore: Send + Sync {
    /// Make sure the artifact is in local storage, fetching it if needed.
    ///
    /// Returns `Ok(false)` when the artifact is not available anywhere.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if local storage cannot be written.
    fn ensure_present(&self, id: &ArtifactId) -> Result<bool, StoreError>;

    /// Open a locally present artifact for reading.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the artifact is not local.
    fn open(&self, id: &ArtifactId) -> Result<Box<dyn Read + Send>, StoreError>;

    /// Local path of the artifact. The file exists only after a successful
    /// [`FileStore::ensure_present`].
    fn local_path(&self, id: &ArtifactId) -> PathBuf;
}

impl<T: FileStore + ?Sized> FileStore for Arc<T> {
    fn ensure_present(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        (**self).ensure_present(id)
    }
    fn open(&self, id: &ArtifactId) -> Result<Box<dyn Read + Send>, StoreError> {
        (**self).open(id)
    }
    fn local_path(&self, id: &ArtifactId) -> PathBuf {
        (**self).local_path(id)
    }
}

/// Directory-backed artifact store.
///
/// Layout: `<root>/<artifact id>`. When an upstream directory is configured,
/// missing artifacts are copied from `<upstream>/<artifact id>`.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    upstream: Option<PathBuf>,
}

impl LocalFileStore {
    /// Create a store rooted at `root` with no upstream.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            upstream: None,
        }
    }

    /// Fetch missing artifacts from `upstream`.
    pub fn with_upstream(mut self, upstream: impl Into<PathBuf>) -> Self {
        self.upstream = Some(upstream.into());
        self
    }

    /// Build the store described by `config`.
    pub fn from_config(config: &PackageConfig) -> Self {
        let store = Self::new(&config.store_dir);
        match &config.upstream_dir {
            Some(upstream) => store.with_upstream(upstream),
            None => store,
        }
    }

    /// Local storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fetch_from_upstream(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        let Some(upstream) = &self.upstream else {
            return Ok(false);
        };
        let source = upstream.join(id.as_str());
        if !source.is_file() {
            return Ok(false);
        }

        fs::create_dir_all(&self.root)?;
        // Stage next to the destination so the final rename stays on one volume.
        let mut staged = tempfile::NamedTempFile::new_in(&self.root)?;
        let mut reader = File::open(&source)?;
        io::copy(&mut reader, staged.as_file_mut())?;
        staged
            .persist(self.local_path(id))
            .map_err(|e| StoreError::Io(e.error))?;

        tracing::info!("Fetched artifact {id} from {}", upstream.display());
        Ok(true)
    }
}

impl FileStore for LocalFileStore {
    fn ensure_present(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        if self.local_path(id).is_file() {
            return Ok(true);
        }
        self.fetch_from_upstream(id)
    }

    fn open(&self, id: &ArtifactId) -> Result<Box<dyn Read + Send>, StoreError> {
        match File::open(self.local_path(id)) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    fn local_path(&self, id: &ArtifactId) -> PathBuf {
        self.root.join(id.as_str())
    }
}
