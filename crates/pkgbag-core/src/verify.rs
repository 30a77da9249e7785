//! Detached signature verification against a set of trusted keys.
//!
//! Signatures are Ed25519 over the raw artifact bytes, Base64 encoded.
//! Public keys are raw 32-byte Ed25519 points.

use std::io::Read;

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::keys::TrustedKeys;

/// Parsed trusted keys, ready to check signatures.
#[derive(Debug, Clone)]
pub struct TrustVerifier {
    keys: Vec<(String, VerifyingKey)>,
}

impl TrustVerifier {
    /// Parse `keys`. Material that is not a valid Ed25519 public key is
    /// logged and left out, so one bad key never blocks the others.
    pub fn new(keys: &TrustedKeys) -> Self {
        let keys = keys
            .iter()
            .filter_map(|(id, material)| match parse_key(material) {
                Ok(key) => Some((id.clone(), key)),
                Err(reason) => {
                    tracing::warn!("Ignoring trusted key {id}: {reason}");
                    None
                }
            })
            .collect();
        Self { keys }
    }

    /// Number of usable keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if no usable key was found.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check `signature` over everything `data` yields.
    ///
    /// Returns `true` as soon as one key validates. Returns `false` if there
    /// are no keys, the signature is malformed, the data cannot be read, or
    /// no key matches.
    pub fn verify(&self, signature: &str, mut data: impl Read) -> bool {
        if self.keys.is_empty() {
            return false;
        }
        let mut bytes = Vec::new();
        if let Err(e) = data.read_to_end(&mut bytes) {
            tracing::error!("Unexpected error reading data to verify: {e}");
            return false;
        }
        self.verify_bytes(signature, &bytes)
    }

    /// Check `signature` over `bytes`.
    pub fn verify_bytes(&self, signature: &str, bytes: &[u8]) -> bool {
        if self.keys.is_empty() {
            return false;
        }
        let signature = match decode_signature(signature) {
            Ok(sig) => sig,
            Err(reason) => {
                tracing::warn!("Rejecting malformed signature: {reason}");
                return false;
            }
        };

        for (id, key) in &self.keys {
            match key.verify(bytes, &signature) {
                Ok(()) => {
                    tracing::debug!("Signature accepted by key {id}");
                    return true;
                }
                Err(e) => tracing::debug!("Key {id} rejected signature: {e}"),
            }
        }
        false
    }
}

/// One-shot form of [`TrustVerifier::verify`].
pub fn verify(signature: &str, data: impl Read, keys: &TrustedKeys) -> bool {
    TrustVerifier::new(keys).verify(signature, data)
}

/// Hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn parse_key(material: &[u8]) -> Result<VerifyingKey, String> {
    let bytes: &[u8; 32] = material
        .try_into()
        .map_err(|_| format!("expected 32 bytes, got {}", material.len()))?;
    VerifyingKey::from_bytes(bytes).map_err(|e| e.to_string())
}

fn decode_signature(signature: &str) -> Result<Signature, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(signature.trim())
        .map_err(|e| format!("invalid Base64: {e}"))?;
    Signature::from_slice(&bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signing_key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn sign(key: &SigningKey, data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(key.sign(data).to_bytes())
    }

    fn trusted(keys: &[(&str, &SigningKey)]) -> TrustedKeys {
        keys.iter()
            .map(|(id, k)| ((*id).to_string(), k.verifying_key().to_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_accepts_when_any_key_matches() {
        let signer = signing_key(1);
        let other = signing_key(2);
        let keys = trusted(&[("a-other", &other), ("b-signer", &signer)]);
        let sig = sign(&signer, b"plugin bytes");
        assert!(verify(&sig, &b"plugin bytes"[..], &keys));
    }

    #[test]
    fn test_rejects_with_no_keys() {
        let signer = signing_key(1);
        let sig = sign(&signer, b"plugin bytes");
        assert!(!verify(&sig, &b"plugin bytes"[..], &TrustedKeys::new()));
    }

    #[test]
    fn test_rejects_when_no_key_matches() {
        let signer = signing_key(1);
        let keys = trusted(&[("other", &signing_key(2))]);
        let sig = sign(&signer, b"plugin bytes");
        assert!(!verify(&sig, &b"plugin bytes"[..], &keys));
    }

    #[test]
    fn test_rejects_tampered_data() {
        let signer = signing_key(1);
        let keys = trusted(&[("signer", &signer)]);
        let sig = sign(&signer, b"plugin bytes");
        assert!(!verify(&sig, &b"plugin bytez"[..], &keys));
    }

    #[test]
    fn test_malformed_key_does_not_block_others() {
        let signer = signing_key(1);
        let mut keys = trusted(&[("good", &signer)]);
        keys.insert("bad".to_string(), vec![0u8; 5]);
        let verifier = TrustVerifier::new(&keys);
        assert_eq!(verifier.len(), 1);
        assert!(verifier.verify(&sign(&signer, b"x"), &b"x"[..]));
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        let keys = trusted(&[("k", &signing_key(1))]);
        assert!(!verify("not base64!", &b"x"[..], &keys));
        assert!(!verify("AAAA", &b"x"[..], &keys));
    }
}
