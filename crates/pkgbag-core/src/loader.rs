//! Loading capabilities: the node-wide default loader and per-package
//! isolated loaders.
//!
//! A package artifact is either a zip archive, whose entries become the
//! package's resources, or an opaque file exposed as a single resource named
//! after its artifact id. A type `a.b.Name` is defined by the resource
//! `a/b/Name.toml`:
//!
//! ```toml
//! kind = "text.LowerCaseFilter"
//!
//! [config]
//! locale = "tr"
//! ```
//!
//! `kind` names a host implementation registered with the [`NodeLoader`].
//! Type names are only ever resolved inside the package's own artifacts;
//! the node loader is consulted for linking `kind`, never as a fallback for
//! the type name itself.
//!
//! Artifacts are read into memory once, when the loader is built. Every
//! resource is served from that copy, so later changes to the store never
//! reach an active package.

use std::any::Any;
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use pkgbag_schema::{ArtifactId, PackageDescriptor};
use serde::Deserialize;
use thiserror::Error;

use crate::store::{FileStore, StoreError};
use crate::verify::sha256_hex;

/// A freshly constructed plugin object, before it is downcast to the
/// capability the caller expects.
pub type Instance = Box<dyn Any + Send>;

/// Host constructor: builds an instance from a type's `[config]` table.
pub type Factory = Arc<dyn Fn(&toml::Table) -> anyhow::Result<Instance> + Send + Sync>;

/// Hex SHA-256 of each verified artifact, by id.
pub type ArtifactDigests = HashMap<ArtifactId, String>;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Errors raised while building or using a loader.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The file store could not provide an artifact. Server-side failure.
    #[error("Artifact not available: {0}")]
    ArtifactUnavailable(ArtifactId),

    /// The file store failed while providing an artifact.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An artifact's bytes differ from the ones that were verified.
    #[error("Artifact {artifact} changed after verification (verified {expected}, found {actual})")]
    DigestMismatch {
        /// Offending artifact.
        artifact: ArtifactId,
        /// Digest taken during verification.
        expected: String,
        /// Digest of the bytes read for loading.
        actual: String,
    },

    /// A verified load was asked for an artifact that was never verified.
    #[error("Artifact {0} was not verified")]
    Unverified(ArtifactId),

    /// Reading an artifact or resource failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An artifact looked like an archive but could not be read as one.
    #[error("Invalid archive {artifact}: {source}")]
    Archive {
        /// Offending artifact.
        artifact: ArtifactId,
        /// Underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// No resource of that name is visible to this loader.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// No type of that name is visible to this loader.
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// The type definition resource is not valid.
    #[error("Invalid definition for type {type_name}: {reason}")]
    InvalidTypeDefinition {
        /// Type being resolved.
        type_name: String,
        /// What is wrong with its definition.
        reason: String,
    },

    /// The type links to a host implementation the node does not have.
    #[error("Type {type_name} links to unknown implementation '{kind}'")]
    UnknownImplementation {
        /// Type being resolved.
        type_name: String,
        /// Implementation it asked for.
        kind: String,
    },

    /// The host implementation refused to build the instance.
    #[error("Failed to construct {type_name}: {message}")]
    Construct {
        /// Type being constructed.
        type_name: String,
        /// Constructor error, with its causes.
        message: String,
    },

    /// The instance does not provide the capability the caller asked for.
    #[error("Type {type_name} is not a {expected}")]
    TypeMismatch {
        /// Type that was constructed.
        type_name: String,
        /// Rust type the caller expected.
        expected: &'static str,
    },
}

/// Definition of a package-provided type.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeDef {
    /// Host implementation this type is built from.
    pub kind: String,
    /// Configuration handed to the implementation.
    #[serde(default)]
    pub config: toml::Table,
}

/// The node-wide default loading capability.
///
/// Resolves types against host implementations registered at startup and
/// serves resources from the node's instance directory.
pub struct NodeLoader {
    instance_dir: PathBuf,
    implementations: HashMap<String, Factory>,
}

impl std::fmt::Debug for NodeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.implementations.keys().collect();
        names.sort();
        f.debug_struct("NodeLoader")
            .field("instance_dir", &self.instance_dir)
            .field("implementations", &names)
            .finish()
    }
}

impl NodeLoader {
    /// Create a loader serving resources from `instance_dir`, with no
    /// implementations registered.
    pub fn new(instance_dir: impl Into<PathBuf>) -> Self {
        Self {
            instance_dir: instance_dir.into(),
            implementations: HashMap::new(),
        }
    }

    /// Register a host implementation under `name`.
    ///
    /// The constructor's result is boxed as an [`Instance`]; callers get it
    /// back with [`ResourceLoader::new_instance::<T>`].
    pub fn with_implementation<T, F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        T: Any + Send,
        F: Fn(&toml::Table) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |config: &toml::Table| -> anyhow::Result<Instance> {
            Ok(Box::new(constructor(config)?))
        });
        self.implementations.insert(name.into(), factory);
        self
    }

    /// Host implementation registered under `name`.
    pub fn implementation(&self, name: &str) -> Option<&Factory> {
        self.implementations.get(name)
    }

    /// Directory resources are served from.
    pub fn instance_dir(&self) -> &Path {
        &self.instance_dir
    }

    fn instantiate(&self, type_name: &str) -> Result<Instance, LoaderError> {
        let factory = self
            .implementation(type_name)
            .ok_or_else(|| LoaderError::TypeNotFound(type_name.to_string()))?;
        construct(type_name, factory, &toml::Table::new())
    }

    fn open_resource(&self, name: &str) -> Result<Vec<u8>, LoaderError> {
        let relative = Path::new(name);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if name.is_empty() || !plain {
            return Err(LoaderError::ResourceNotFound(name.to_string()));
        }
        match std::fs::read(self.instance_dir.join(relative)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(LoaderError::ResourceNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug)]
enum ArtifactLayout {
    Archive,
    Opaque,
}

/// One artifact as indexed by a [`PackageLoader`].
pub struct LoadedArtifact {
    id: ArtifactId,
    path: PathBuf,
    sha256: String,
    layout: ArtifactLayout,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for LoadedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedArtifact")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("sha256", &self.sha256)
            .field("layout", &self.layout)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl LoadedArtifact {
    /// Store id.
    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    /// Local path the artifact was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hex SHA-256 of the bytes this loader serves.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// True if the artifact is a zip archive.
    pub fn is_archive(&self) -> bool {
        matches!(self.layout, ArtifactLayout::Archive)
    }
}

/// Loading capability scoped to one package's artifacts.
#[derive(Debug)]
pub struct PackageLoader {
    package: String,
    artifacts: Vec<LoadedArtifact>,
    resources: HashMap<String, usize>,
    node: Arc<NodeLoader>,
}

impl PackageLoader {
    /// Fetch every artifact of `descriptor` and index its resources,
    /// without checking them against a verification pass.
    ///
    /// All-or-nothing: the first artifact that cannot be fetched or read
    /// aborts the whole construction.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::ArtifactUnavailable`] if the store cannot
    /// provide an artifact, or an I/O or archive error if one is unreadable.
    pub fn load(
        descriptor: &PackageDescriptor,
        store: &dyn FileStore,
        node: Arc<NodeLoader>,
    ) -> Result<Self, LoaderError> {
        Self::build(descriptor, store, node, None)
    }

    /// Like [`PackageLoader::load`], but every artifact must hash to the
    /// digest recorded when its signature was checked.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::DigestMismatch`] if an artifact changed since
    /// verification, [`LoaderError::Unverified`] if `verified` lacks it, or
    /// any error of [`PackageLoader::load`].
    pub fn load_verified(
        descriptor: &PackageDescriptor,
        store: &dyn FileStore,
        node: Arc<NodeLoader>,
        verified: &ArtifactDigests,
    ) -> Result<Self, LoaderError> {
        Self::build(descriptor, store, node, Some(verified))
    }

    fn build(
        descriptor: &PackageDescriptor,
        store: &dyn FileStore,
        node: Arc<NodeLoader>,
        verified: Option<&ArtifactDigests>,
    ) -> Result<Self, LoaderError> {
        let mut artifacts = Vec::with_capacity(descriptor.artifacts().len());
        let mut resources = HashMap::new();

        for (index, artifact) in descriptor.artifacts().iter().enumerate() {
            if !store.ensure_present(&artifact.id)? {
                return Err(LoaderError::ArtifactUnavailable(artifact.id.clone()));
            }
            let path = store.local_path(&artifact.id);
            let mut bytes = Vec::new();
            store.open(&artifact.id)?.read_to_end(&mut bytes)?;
            let sha256 = sha256_hex(&bytes);

            if let Some(verified) = verified {
                let expected = verified
                    .get(&artifact.id)
                    .ok_or_else(|| LoaderError::Unverified(artifact.id.clone()))?;
                if *expected != sha256 {
                    return Err(LoaderError::DigestMismatch {
                        artifact: artifact.id.clone(),
                        expected: expected.clone(),
                        actual: sha256,
                    });
                }
            }

            let layout = if bytes.starts_with(&ZIP_MAGIC) {
                let archive = open_archive(&artifact.id, &bytes)?;
                for name in archive.file_names().filter(|n| !n.ends_with('/')) {
                    // Earlier artifacts shadow later ones.
                    resources.entry(name.to_string()).or_insert(index);
                }
                ArtifactLayout::Archive
            } else {
                resources.entry(artifact.id.to_string()).or_insert(index);
                ArtifactLayout::Opaque
            };

            tracing::debug!(
                "Package {}: indexed {} ({sha256})",
                descriptor.name(),
                artifact.id
            );
            artifacts.push(LoadedArtifact {
                id: artifact.id.clone(),
                path,
                sha256,
                layout,
                bytes,
            });
        }

        Ok(Self {
            package: descriptor.name().to_string(),
            artifacts,
            resources,
            node,
        })
    }

    /// Name of the package this loader serves.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Artifacts in load order.
    pub fn artifacts(&self) -> &[LoadedArtifact] {
        &self.artifacts
    }

    /// Whether `name` is a resource of this package.
    pub fn has_resource(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// All resource names of this package, sorted.
    pub fn resource_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve and parse the definition of `type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::TypeNotFound`] if no artifact of this package
    /// defines the type, or [`LoaderError::InvalidTypeDefinition`] if the
    /// definition cannot be parsed.
    pub fn type_def(&self, type_name: &str) -> Result<TypeDef, LoaderError> {
        let resource = type_resource(type_name);
        if !self.has_resource(&resource) {
            return Err(LoaderError::TypeNotFound(type_name.to_string()));
        }
        let bytes = self.open_resource(&resource)?;
        let invalid = |reason: String| LoaderError::InvalidTypeDefinition {
            type_name: type_name.to_string(),
            reason,
        };
        let text = String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))?;
        toml::from_str(&text).map_err(|e| invalid(e.to_string()))
    }

    fn instantiate(&self, type_name: &str) -> Result<Instance, LoaderError> {
        let def = self.type_def(type_name)?;
        let factory =
            self.node
                .implementation(&def.kind)
                .ok_or_else(|| LoaderError::UnknownImplementation {
                    type_name: type_name.to_string(),
                    kind: def.kind.clone(),
                })?;
        construct(type_name, factory, &def.config)
    }

    fn open_resource(&self, name: &str) -> Result<Vec<u8>, LoaderError> {
        let index = *self
            .resources
            .get(name)
            .ok_or_else(|| LoaderError::ResourceNotFound(name.to_string()))?;
        let artifact = &self.artifacts[index];
        match artifact.layout {
            ArtifactLayout::Opaque => Ok(artifact.bytes.clone()),
            ArtifactLayout::Archive => {
                let mut archive = open_archive(&artifact.id, &artifact.bytes)?;
                let mut entry = archive
                    .by_name(name)
                    .map_err(|source| LoaderError::Archive {
                        artifact: artifact.id.clone(),
                        source,
                    })?;
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }
}

/// A loading capability: the node default or one package's scoped loader.
///
/// Callers hold one of these without caring which variant it is.
#[derive(Debug, Clone)]
pub enum ResourceLoader {
    /// The node-wide default loader.
    Node(Arc<NodeLoader>),
    /// A package's isolated loader.
    Package(Arc<PackageLoader>),
}

impl ResourceLoader {
    /// Package served by this loader, or `None` for the node default.
    pub fn package(&self) -> Option<&str> {
        match self {
            Self::Node(_) => None,
            Self::Package(p) => Some(p.package()),
        }
    }

    /// Read a resource visible to this loader.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::ResourceNotFound`] if the resource is not
    /// visible, or an I/O or archive error if reading it fails.
    pub fn open_resource(&self, name: &str) -> Result<Vec<u8>, LoaderError> {
        match self {
            Self::Node(node) => node.open_resource(name),
            Self::Package(p) => p.open_resource(name),
        }
    }

    /// Build an instance of `type_name` without checking its Rust type.
    ///
    /// # Errors
    ///
    /// Returns a [`LoaderError`] if the type cannot be resolved, linked or
    /// constructed.
    pub fn instantiate(&self, type_name: &str) -> Result<Instance, LoaderError> {
        match self {
            Self::Node(node) => node.instantiate(type_name),
            Self::Package(p) => p.instantiate(type_name),
        }
    }

    /// Build an instance of `type_name` and check that it is a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::TypeMismatch`] if the instance is not a `T`,
    /// or any error of [`ResourceLoader::instantiate`].
    pub fn new_instance<T: Any>(&self, type_name: &str) -> Result<T, LoaderError> {
        self.instantiate(type_name)?
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| LoaderError::TypeMismatch {
                type_name: type_name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

/// Resource that defines `type_name`: `a.b.Name` lives at `a/b/Name.toml`.
pub fn type_resource(type_name: &str) -> String {
    format!("{}.toml", type_name.replace('.', "/"))
}

fn construct(type_name: &str, factory: &Factory, config: &toml::Table) -> Result<Instance, LoaderError> {
    factory(config).map_err(|e| LoaderError::Construct {
        type_name: type_name.to_string(),
        message: format!("{e:#}"),
    })
}

fn open_archive<'a>(
    id: &ArtifactId,
    bytes: &'a [u8],
) -> Result<zip::ZipArchive<Cursor<&'a [u8]>>, LoaderError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|source| LoaderError::Archive {
        artifact: id.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalFileStore;
    use pkgbag_schema::ArtifactRef;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq)]
    struct Greeter {
        greeting: String,
    }

    fn node(instance_dir: &Path) -> Arc<NodeLoader> {
        Arc::new(
            NodeLoader::new(instance_dir).with_implementation("host.Greeter", |config| {
                let greeting = config
                    .get("greeting")
                    .and_then(toml::Value::as_str)
                    .unwrap_or("hello")
                    .to_string();
                Ok(Greeter { greeting })
            }),
        )
    }

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn descriptor(name: &str, ids: &[&str]) -> PackageDescriptor {
        let artifacts = ids
            .iter()
            .map(|id| ArtifactRef::new(ArtifactId::new(*id).unwrap(), "sig"))
            .collect();
        PackageDescriptor::new(name, "1.0", None, artifacts, 1).unwrap()
    }

    #[test]
    fn test_instantiates_package_type() {
        let dir = TempDir::new().unwrap();
        write_archive(
            &dir.path().join("greet.zip"),
            &[(
                "acme/Hola.toml",
                b"kind = \"host.Greeter\"\n[config]\ngreeting = \"hola\"\n",
            )],
        );
        let store = LocalFileStore::new(dir.path());
        let loader = PackageLoader::load(&descriptor("greet", &["greet.zip"]), &store, node(dir.path()))
            .unwrap();
        let loader = ResourceLoader::Package(Arc::new(loader));

        let greeter: Greeter = loader.new_instance("acme.Hola").unwrap();
        assert_eq!(greeter.greeting, "hola");
        assert_eq!(loader.package(), Some("greet"));
    }

    #[test]
    fn test_type_names_do_not_fall_back_to_node() {
        let dir = TempDir::new().unwrap();
        write_archive(&dir.path().join("empty.zip"), &[("README", b"nothing")]);
        let store = LocalFileStore::new(dir.path());
        let loader =
            PackageLoader::load(&descriptor("empty", &["empty.zip"]), &store, node(dir.path()))
                .unwrap();
        let loader = ResourceLoader::Package(Arc::new(loader));

        assert!(matches!(
            loader.new_instance::<Greeter>("host.Greeter"),
            Err(LoaderError::TypeNotFound(_))
        ));
        let default = ResourceLoader::Node(node(dir.path()));
        assert!(default.new_instance::<Greeter>("host.Greeter").is_ok());
    }

    #[test]
    fn test_wrong_capability_is_a_mismatch() {
        let dir = TempDir::new().unwrap();
        let default = ResourceLoader::Node(node(dir.path()));
        assert!(matches!(
            default.new_instance::<String>("host.Greeter"),
            Err(LoaderError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_kind_and_bad_definition() {
        let dir = TempDir::new().unwrap();
        write_archive(
            &dir.path().join("p.zip"),
            &[
                ("x/Missing.toml", b"kind = \"host.Nope\"\n"),
                ("x/Broken.toml", b"kind = [\n"),
            ],
        );
        let store = LocalFileStore::new(dir.path());
        let loader = PackageLoader::load(&descriptor("p", &["p.zip"]), &store, node(dir.path()))
            .unwrap();
        let loader = ResourceLoader::Package(Arc::new(loader));
        assert!(matches!(
            loader.instantiate("x.Missing"),
            Err(LoaderError::UnknownImplementation { .. })
        ));
        assert!(matches!(
            loader.instantiate("x.Broken"),
            Err(LoaderError::InvalidTypeDefinition { .. })
        ));
    }

    #[test]
    fn test_earlier_artifact_shadows_later() {
        let dir = TempDir::new().unwrap();
        write_archive(&dir.path().join("first.zip"), &[("conf/a.txt", b"first")]);
        write_archive(
            &dir.path().join("second.zip"),
            &[("conf/a.txt", b"second"), ("conf/b.txt", b"only second")],
        );
        std::fs::write(dir.path().join("stopwords.txt"), b"a\nthe\n").unwrap();
        let store = LocalFileStore::new(dir.path());
        let loader = PackageLoader::load(
            &descriptor("p", &["first.zip", "second.zip", "stopwords.txt"]),
            &store,
            node(dir.path()),
        )
        .unwrap();

        assert_eq!(loader.resource_names(), ["conf/a.txt", "conf/b.txt", "stopwords.txt"]);
        assert!(loader.artifacts()[0].is_archive());
        assert!(!loader.artifacts()[2].is_archive());
        assert_eq!(loader.artifacts()[2].sha256().len(), 64);

        let loader = ResourceLoader::Package(Arc::new(loader));
        assert_eq!(loader.open_resource("conf/a.txt").unwrap(), b"first");
        assert_eq!(loader.open_resource("conf/b.txt").unwrap(), b"only second");
        assert_eq!(loader.open_resource("stopwords.txt").unwrap(), b"a\nthe\n");
    }

    #[test]
    fn test_missing_artifact_aborts_construction() {
        let dir = TempDir::new().unwrap();
        write_archive(&dir.path().join("ok.zip"), &[("a", b"a")]);
        let store = LocalFileStore::new(dir.path());
        let result = PackageLoader::load(
            &descriptor("p", &["ok.zip", "gone.zip"]),
            &store,
            node(dir.path()),
        );
        assert!(matches!(result, Err(LoaderError::ArtifactUnavailable(id)) if id.as_str() == "gone.zip"));
    }

    #[test]
    fn test_verified_load_rejects_changed_artifact() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"verified").unwrap();
        let store = LocalFileStore::new(dir.path());
        let d = descriptor("p", &["a.bin"]);
        let id = ArtifactId::new("a.bin").unwrap();

        let mut verified = ArtifactDigests::new();
        verified.insert(id.clone(), sha256_hex(b"verified"));
        assert!(PackageLoader::load_verified(&d, &store, node(dir.path()), &verified).is_ok());

        std::fs::write(dir.path().join("a.bin"), b"swapped").unwrap();
        let result = PackageLoader::load_verified(&d, &store, node(dir.path()), &verified);
        assert!(matches!(result, Err(LoaderError::DigestMismatch { artifact, .. }) if artifact == id));

        let result = PackageLoader::load_verified(&d, &store, node(dir.path()), &ArtifactDigests::new());
        assert!(matches!(result, Err(LoaderError::Unverified(_))));
    }

    #[test]
    fn test_resources_come_from_the_loaded_copy() {
        let dir = TempDir::new().unwrap();
        write_archive(&dir.path().join("p.zip"), &[("conf/a.txt", b"loaded")]);
        std::fs::write(dir.path().join("words.txt"), b"loaded").unwrap();
        let store = LocalFileStore::new(dir.path());
        let loader = PackageLoader::load(
            &descriptor("p", &["p.zip", "words.txt"]),
            &store,
            node(dir.path()),
        )
        .unwrap();

        write_archive(&dir.path().join("p.zip"), &[("conf/a.txt", b"rewritten")]);
        std::fs::write(dir.path().join("words.txt"), b"rewritten").unwrap();

        let loader = ResourceLoader::Package(Arc::new(loader));
        assert_eq!(loader.open_resource("conf/a.txt").unwrap(), b"loaded");
        assert_eq!(loader.open_resource("words.txt").unwrap(), b"loaded");
    }

    #[test]
    fn test_node_resources_stay_in_instance_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("conf")).unwrap();
        std::fs::write(dir.path().join("conf/schema.xml"), b"<schema/>").unwrap();
        let default = ResourceLoader::Node(node(dir.path()));

        assert_eq!(default.open_resource("conf/schema.xml").unwrap(), b"<schema/>");
        assert!(matches!(
            default.open_resource("../etc/passwd"),
            Err(LoaderError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_type_resource_path() {
        assert_eq!(type_resource("org.acme.Filter"), "org/acme/Filter.toml");
        assert_eq!(type_resource("Plain"), "Plain.toml");
    }
}
