//! Shared types for pkgbag.
//!
//! The descriptor model mirrors the `packages` section of the cluster
//! metadata snapshot. Everything here is immutable once constructed.

pub mod descriptor;
pub mod snapshot;

// Re-exports
pub use descriptor::{ArtifactId, ArtifactRef, DescriptorError, PackageDescriptor};
pub use snapshot::{PACKAGES_KEY, ParsedPackages, parse_packages};

/// Metadata version reported for packages the node does not know about.
pub const UNKNOWN_VERSION: i64 = -1;
