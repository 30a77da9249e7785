//! Parsing of the `packages` section of a cluster metadata snapshot.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::descriptor::{DescriptorError, PackageDescriptor};

/// Key of the package section inside the cluster metadata snapshot.
pub const PACKAGES_KEY: &str = "packages";

/// Result of reading the package section of one snapshot.
#[derive(Debug, Default)]
pub struct ParsedPackages {
    /// Well-formed descriptors by package name.
    pub descriptors: BTreeMap<String, PackageDescriptor>,
    /// Record entries that failed to parse, by key.
    pub malformed: BTreeMap<String, DescriptorError>,
    /// Every key of the section, including ignored non-record values.
    pub listed: BTreeSet<String>,
}

impl ParsedPackages {
    /// True if the section had no entries at all.
    pub fn is_empty(&self) -> bool {
        self.listed.is_empty()
    }

    /// True if the section mentions `name`, whatever its value.
    pub fn lists(&self, name: &str) -> bool {
        self.listed.contains(name)
    }
}

/// Parse the `packages` section of `properties` observed at `version`.
///
/// A missing section is an empty one. Entries whose value is not a record
/// are listed but otherwise ignored. Records that fail to parse end up in
/// [`ParsedPackages::malformed`] without affecting their siblings.
///
/// # Errors
///
/// Returns [`DescriptorError::InvalidFieldType`] if the section itself is
/// present but not a record.
pub fn parse_packages(
    properties: &Map<String, Value>,
    version: i64,
) -> Result<ParsedPackages, DescriptorError> {
    let section = match properties.get(PACKAGES_KEY) {
        None | Some(Value::Null) => return Ok(ParsedPackages::default()),
        Some(Value::Object(section)) => section,
        Some(_) => {
            return Err(DescriptorError::InvalidFieldType {
                field: PACKAGES_KEY,
                expected: "an object",
            });
        }
    };

    let mut parsed = ParsedPackages::default();
    for (key, value) in section {
        parsed.listed.insert(key.clone());
        let Value::Object(record) = value else {
            continue;
        };
        let result = PackageDescriptor::from_record(record, version).and_then(|d| {
            if d.name() == key {
                Ok(d)
            } else {
                Err(DescriptorError::NameMismatch {
                    key: key.clone(),
                    name: d.name().to_string(),
                })
            }
        });
        match result {
            Ok(d) => {
                parsed.descriptors.insert(key.clone(), d);
            }
            Err(e) => {
                parsed.malformed.insert(key.clone(), e);
            }
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("properties must be an object"),
        }
    }

    #[test]
    fn test_missing_section_is_empty() {
        let parsed = parse_packages(&props(json!({"urlScheme": "https"})), 3).unwrap();
        assert!(parsed.is_empty());
        assert!(parsed.descriptors.is_empty());
    }

    #[test]
    fn test_non_record_values_are_ignored_but_listed() {
        let parsed = parse_packages(
            &props(json!({"packages": {
                "pkgA": {"name": "pkgA", "version": "1", "file": {"id": "a", "sig": "S"}},
                "note": "not a package"
            }})),
            7,
        )
        .unwrap();
        assert_eq!(parsed.descriptors.len(), 1);
        assert!(parsed.malformed.is_empty());
        assert!(parsed.lists("note"));
        assert_eq!(parsed.descriptors["pkgA"].observed_version(), 7);
    }

    #[test]
    fn test_malformed_entry_does_not_affect_siblings() {
        let parsed = parse_packages(
            &props(json!({"packages": {
                "good": {"name": "good", "version": "1", "file": {"id": "a", "sig": "S"}},
                "bad": {"name": "bad", "version": "1", "file": 42}
            }})),
            1,
        )
        .unwrap();
        assert!(parsed.descriptors.contains_key("good"));
        assert!(parsed.malformed.contains_key("bad"));
    }

    #[test]
    fn test_name_must_match_key() {
        let parsed = parse_packages(
            &props(json!({"packages": {
                "alias": {"name": "real", "version": "1", "file": {"id": "a", "sig": "S"}}
            }})),
            1,
        )
        .unwrap();
        assert!(matches!(
            parsed.malformed.get("alias"),
            Some(DescriptorError::NameMismatch { .. })
        ));
    }

    #[test]
    fn test_section_of_wrong_type_is_an_error() {
        assert!(parse_packages(&props(json!({"packages": ["pkgA"]})), 1).is_err());
    }
}
