//! Shared fixtures: a temporary node with a file store, trusted keys and an
//! instance directory, plus helpers to publish signed artifacts.
#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use pkgbag_core::{DirKeyStore, FileStore, LocalFileStore, NodeLoader, PackageConfig, PackageRegistry};
use serde_json::{Map, Value, json};
use tempfile::TempDir;

/// Host implementation used by package type definitions in tests.
#[derive(Debug, Clone, PartialEq)]
pub struct Greeter {
    pub greeting: String,
}

pub struct Node {
    pub dir: TempDir,
    pub signer: SigningKey,
}

impl Node {
    pub fn new() -> Self {
        let node = Self {
            dir: TempDir::new().expect("failed to create temp dir"),
            signer: SigningKey::from_bytes(&[42; 32]),
        };
        std::fs::create_dir_all(node.store_dir()).unwrap();
        std::fs::create_dir_all(node.instance_dir()).unwrap();
        node
    }

    pub fn store_dir(&self) -> PathBuf {
        self.dir.path().join("filestore")
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.dir.path().join("keys")
    }

    pub fn instance_dir(&self) -> PathBuf {
        self.dir.path().join("instance")
    }

    /// Trust `signer` for executable packages under `key_id`.
    pub fn trust(&self, key_id: &str, signer: &SigningKey) {
        let exe = self.keys_dir().join("exe");
        std::fs::create_dir_all(&exe).unwrap();
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(signer.verifying_key().to_bytes());
        std::fs::write(exe.join(key_id), encoded).unwrap();
    }

    /// Write a zip artifact into the store and return its `{id, sig}` record,
    /// signed by the node's default signer.
    pub fn publish(&self, id: &str, entries: &[(&str, &str)]) -> Value {
        self.publish_signed_by(id, entries, &self.signer)
    }

    pub fn publish_signed_by(&self, id: &str, entries: &[(&str, &str)], signer: &SigningKey) -> Value {
        let path = self.store_dir().join(id);
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let sig = base64::engine::general_purpose::STANDARD.encode(signer.sign(&bytes).to_bytes());
        json!({"id": id, "sig": sig})
    }

    pub fn config(&self) -> PackageConfig {
        PackageConfig {
            enabled: true,
            verify_signatures: true,
            store_dir: self.store_dir(),
            keys_dir: self.keys_dir(),
            instance_dir: self.instance_dir(),
            ..PackageConfig::default()
        }
    }

    pub fn node_loader(&self) -> Arc<NodeLoader> {
        Arc::new(
            NodeLoader::new(self.instance_dir()).with_implementation("host.Greeter", |config| {
                let greeting = config
                    .get("greeting")
                    .and_then(toml::Value::as_str)
                    .unwrap_or("hello")
                    .to_string();
                Ok(Greeter { greeting })
            }),
        )
    }

    pub fn registry(&self) -> PackageRegistry {
        self.registry_with_store(Arc::new(LocalFileStore::new(self.store_dir())))
    }

    pub fn registry_with_store(&self, store: Arc<dyn FileStore>) -> PackageRegistry {
        PackageRegistry::new(
            &self.config(),
            self.node_loader(),
            store,
            Arc::new(DirKeyStore::new(self.keys_dir())),
        )
    }
}

/// Type definition resource for a greeter type.
pub fn greeter_def(greeting: &str) -> String {
    format!("kind = \"host.Greeter\"\n\n[config]\ngreeting = \"{greeting}\"\n")
}

pub fn package(name: &str, version: &str, files: &[Value]) -> Value {
    json!({"name": name, "version": version, "files": files})
}

pub fn snapshot(packages: &[(&str, Value)]) -> Map<String, Value> {
    let section: Map<String, Value> = packages
        .iter()
        .map(|(name, record)| ((*name).to_string(), record.clone()))
        .collect();
    let mut props = Map::new();
    props.insert("packages".to_string(), Value::Object(section));
    props
}
