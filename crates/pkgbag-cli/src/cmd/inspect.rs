//! Inspect command

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Table, presets::UTF8_FULL};
use pkgbag_core::PackageConfig;
use pkgbag_schema::{PackageDescriptor, parse_packages};

use super::{open_registry, read_snapshot};

/// Print the packages of one snapshot and their validation result, without
/// loading anything.
pub fn inspect(config: &PackageConfig, path: &Path) -> Result<()> {
    let (version, properties) = read_snapshot(path)?;
    let parsed = parse_packages(&properties, version.unwrap_or(0))
        .with_context(|| format!("Snapshot {}", path.display()))?;
    let registry = open_registry(config);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Package", "Version", "Artifacts", "Validation"]);

    for (name, descriptor) in &parsed.descriptors {
        let errors = if config.verify_signatures {
            registry.validator().validate(descriptor)
        } else {
            registry.validator().check_enabled()
        };
        let status = if errors.is_empty() {
            "ok".to_string()
        } else {
            errors.join("\n")
        };
        table.add_row(vec![
            name.clone(),
            descriptor.version().to_string(),
            artifact_list(descriptor),
            status,
        ]);
    }
    for (name, e) in &parsed.malformed {
        table.add_row(vec![name.clone(), "-".to_string(), "-".to_string(), e.to_string()]);
    }

    if parsed.descriptors.is_empty() && parsed.malformed.is_empty() {
        println!("No packages in {}", path.display());
    } else {
        println!("{table}");
    }
    Ok(())
}

fn artifact_list(descriptor: &PackageDescriptor) -> String {
    descriptor
        .artifacts()
        .iter()
        .map(|a| a.id.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
