//! Package descriptor model.
//!
//! A descriptor is built from one raw record of the metadata snapshot:
//!
//! ```json
//! { "name": "pkgA", "version": "1.0", "manifest": "...",
//!   "file": { "id": "a.jar", "sig": "<base64>" } }
//! ```
//!
//! Construction is all-or-nothing: a malformed record never yields a
//! partially filled descriptor.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while building a [`PackageDescriptor`] from a raw record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// A required attribute is absent.
    #[error("Missing required attribute '{0}'")]
    MissingField(&'static str),

    /// An attribute is present but has the wrong JSON type.
    #[error("Invalid type for attribute '{field}': expected {expected}")]
    InvalidFieldType {
        /// Attribute name.
        field: &'static str,
        /// Human-readable description of the accepted type.
        expected: &'static str,
    },

    /// Both `file` and `files` are present.
    #[error("Only one of 'file' or 'files' may be present")]
    ConflictingArtifacts,

    /// An element of the artifact list is not a record.
    #[error("Artifact entry {0} should be an object")]
    ArtifactNotRecord(usize),

    /// The artifact list is empty.
    #[error("A package needs at least one artifact")]
    NoArtifacts,

    /// An artifact id is not a plain file store name.
    #[error("Invalid artifact id '{0}'")]
    InvalidArtifactId(String),

    /// The record's `name` differs from the key it was stored under.
    #[error("Package stored under '{key}' declares name '{name}'")]
    NameMismatch {
        /// Key in the `packages` section.
        key: String,
        /// Name declared inside the record.
        name: String,
    },
}

/// Identifier of an artifact in the distributed file store.
///
/// Ids are plain names: non-empty, without path separators, and never `.` or
/// `..`, so joining one onto a store root stays inside that root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Validate and wrap an artifact id.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::InvalidArtifactId`] if `id` is empty,
    /// contains `/`, `\` or a NUL byte, or is `.` / `..`.
    pub fn new(id: impl Into<String>) -> Result<Self, DescriptorError> {
        let id = id.into();
        let bad = id.is_empty()
            || id == "."
            || id == ".."
            || id.contains(['/', '\\', '\0']);
        if bad {
            return Err(DescriptorError::InvalidArtifactId(id));
        }
        Ok(Self(id))
    }

    /// Return the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ArtifactId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One signed artifact of a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactRef {
    /// Store id of the artifact.
    pub id: ArtifactId,
    /// Detached signature over the artifact bytes (Base64).
    pub sig: String,
}

impl ArtifactRef {
    /// Create an artifact reference from an already validated id.
    pub fn new(id: ArtifactId, sig: impl Into<String>) -> Self {
        Self {
            id,
            sig: sig.into(),
        }
    }

    fn from_value(index: usize, value: &Value) -> Result<Self, DescriptorError> {
        let Value::Object(record) = value else {
            return Err(DescriptorError::ArtifactNotRecord(index));
        };
        let id = required_str(record, "id")?;
        let sig = required_str(record, "sig")?;
        Ok(Self::new(ArtifactId::new(id)?, sig))
    }
}

/// Immutable description of one package version.
///
/// Equality in the registry sense is [`PackageDescriptor::is_equivalent`],
/// not field-wise equality.
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    name: String,
    version: String,
    manifest: Option<String>,
    artifacts: Vec<ArtifactRef>,
    observed_version: i64,
}

impl PackageDescriptor {
    /// Build a descriptor from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::NoArtifacts`] if `artifacts` is empty.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        manifest: Option<String>,
        artifacts: Vec<ArtifactRef>,
        observed_version: i64,
    ) -> Result<Self, DescriptorError> {
        if artifacts.is_empty() {
            return Err(DescriptorError::NoArtifacts);
        }
        Ok(Self {
            name: name.into(),
            version: version.into(),
            manifest,
            artifacts,
            observed_version,
        })
    }

    /// Parse a descriptor from a raw snapshot record.
    ///
    /// The artifact list may be given under `file` or `files`, each accepting
    /// either a single record or a list of records.
    ///
    /// # Errors
    ///
    /// Returns a [`DescriptorError`] describing the first problem found.
    pub fn from_record(
        record: &Map<String, Value>,
        observed_version: i64,
    ) -> Result<Self, DescriptorError> {
        let name = required_str(record, "name")?;
        let version = required_str(record, "version")?;
        let manifest = match record.get("manifest") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(DescriptorError::InvalidFieldType {
                    field: "manifest",
                    expected: "a string",
                });
            }
        };

        let (field, raw) = match (record.get("file"), record.get("files")) {
            (Some(_), Some(_)) => return Err(DescriptorError::ConflictingArtifacts),
            (Some(v), None) => ("file", v),
            (None, Some(v)) => ("files", v),
            (None, None) => return Err(DescriptorError::MissingField("file")),
        };
        let artifacts = match raw {
            Value::Object(_) => vec![ArtifactRef::from_value(0, raw)?],
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| ArtifactRef::from_value(i, v))
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                return Err(DescriptorError::InvalidFieldType {
                    field,
                    expected: "an object or a list of objects",
                });
            }
        };

        Self::new(name, version, manifest, artifacts, observed_version)
    }

    /// Package name, unique within a node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Informational manifest, if any.
    pub fn manifest(&self) -> Option<&str> {
        self.manifest.as_deref()
    }

    /// Signed artifacts in load order. Never empty.
    pub fn artifacts(&self) -> &[ArtifactRef] {
        &self.artifacts
    }

    /// Metadata-store version at which this descriptor was read.
    pub fn observed_version(&self) -> i64 {
        self.observed_version
    }

    /// Whether replacing `self` with `other` can skip a reload.
    ///
    /// Only `version` and the ordered artifact list count. A change to the
    /// manifest or the observed metadata version alone is not a change.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.version == other.version && self.artifacts == other.artifacts
    }
}

impl Serialize for PackageDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            name: &'a str,
            version: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            manifest: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            file: Option<&'a ArtifactRef>,
            #[serde(skip_serializing_if = "Option::is_none")]
            files: Option<&'a [ArtifactRef]>,
        }

        let (file, files) = match self.artifacts.as_slice() {
            [single] => (Some(single), None),
            many => (None, Some(many)),
        };
        Wire {
            name: &self.name,
            version: &self.version,
            manifest: self.manifest.as_deref(),
            file,
            files,
        }
        .serialize(serializer)
    }
}

fn required_str(record: &Map<String, Value>, field: &'static str) -> Result<String, DescriptorError> {
    match record.get(field) {
        None | Some(Value::Null) => Err(DescriptorError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DescriptorError::InvalidFieldType {
            field,
            expected: "a string",
        }),
    }
}
