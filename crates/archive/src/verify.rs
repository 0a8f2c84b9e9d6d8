//! # Signature Verification
//!
//! Binary-extension edges are trust boundaries: before a `lib` artifact may
//! enter a resolved graph, the artifact and its metadata descriptor must both
//! carry detached signatures that check out against a locally trusted
//! keyring. The chain fails closed; any missing companion, unknown key, or
//! read error rejects the edge.
//!
//! A detached signature file is 72 bytes: the signing key's 8-byte big-endian
//! identifier followed by the 64-byte Ed25519 signature over the SHA-512
//! digest of the signed file. The keyring is a TOML document listing trusted
//! keys by identifier:
//!
//! ```toml
//! [[keys]]
//! id = "9f2c41d08a6b73e5"
//! public = "<64 hex characters>"
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use ed25519_dalek::{Signature, VerifyingKey};
use serde::Deserialize;
use sha2::{Digest, Sha512};

//================================================================================================
// Types
//================================================================================================

/// An error that can occur while loading a keyring.
#[derive(thiserror::Error, Debug)]
pub enum KeyringError {
    /// The keyring file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The keyring file is not valid TOML.
    #[error("malformed keyring")]
    Malformed(#[from] toml_edit::de::Error),
    /// A key entry's hex field does not decode.
    #[error("key `{id}` is not valid hex")]
    InvalidHex {
        /// The offending key's identifier field.
        id: String,
    },
    /// A key entry's public bytes are not a valid Ed25519 point.
    #[error("key `{id}` is not a valid public key")]
    InvalidKey {
        /// The offending key's identifier field.
        id: String,
    },
}

#[derive(Deserialize)]
struct KeyringFile {
    #[serde(default)]
    keys: Vec<KeyEntry>,
}

#[derive(Deserialize)]
struct KeyEntry {
    id: String,
    public: String,
}

/// A verifier holding the trusted public keys, loaded once per process.
pub struct SignatureVerifier {
    keys: HashMap<u64, VerifyingKey>,
}

/// An ordered set of verifiers that must all accept an edge.
#[derive(Default)]
pub struct VerifierChain {
    verifiers: Vec<Arc<dyn Verifier>>,
}

//================================================================================================
// Traits
//================================================================================================

/// The pluggable trust gate applied to binary-extension edges.
pub trait Verifier: Send + Sync {
    /// Whether the candidate artifact and its descriptor both verify against
    /// their detached signatures. Any failure along the chain returns false.
    fn verify(
        &self,
        candidate: &Path,
        signature: &Path,
        descriptor: &Path,
        descriptor_signature: &Path,
    ) -> bool;
}

//================================================================================================
// Impls
//================================================================================================

impl SignatureVerifier {
    /// Loads the keyring at the given path.
    pub fn load(keyring: &Path) -> Result<Self, KeyringError> {
        let raw = std::fs::read_to_string(keyring)?;
        let file: KeyringFile = toml_edit::de::from_str(&raw)?;

        let mut keys = HashMap::with_capacity(file.keys.len());
        for entry in file.keys {
            let id = u64::from_str_radix(&entry.id, 16)
                .map_err(|_| KeyringError::InvalidHex { id: entry.id.clone() })?;
            let bytes: [u8; 32] = hex::decode(&entry.public)
                .ok()
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| KeyringError::InvalidHex { id: entry.id.clone() })?;
            let key = VerifyingKey::from_bytes(&bytes)
                .map_err(|_| KeyringError::InvalidKey { id: entry.id.clone() })?;
            keys.insert(id, key);
        }

        tracing::debug!(path = %keyring.display(), count = keys.len(), "loaded keyring");
        Ok(Self { keys })
    }

    /// Creates a verifier directly from trusted keys, bypassing the keyring
    /// file.
    pub fn with_keys(keys: impl IntoIterator<Item = (u64, VerifyingKey)>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Checks one signed file against its detached signature.
    fn check(&self, target: &Path, signature: &Path) -> Result<(), std::io::Error> {
        let sig = std::fs::read(signature)?;
        if sig.len() != 72 {
            return Err(std::io::Error::other("signature file is not 72 bytes"));
        }

        let key_id = u64::from_be_bytes(sig[..8].try_into().unwrap_or_default());
        let key = self
            .keys
            .get(&key_id)
            .ok_or_else(|| std::io::Error::other(format!("unknown signing key {key_id:016x}")))?;

        let sig_bytes: [u8; 64] = sig[8..]
            .try_into()
            .map_err(|_| std::io::Error::other("malformed signature bytes"))?;
        let sig = Signature::from_bytes(&sig_bytes);

        let mut hasher = Sha512::new();
        std::io::copy(&mut File::open(target)?, &mut hasher)?;

        key.verify_prehashed(hasher, None, &sig)
            .map_err(|e| std::io::Error::other(e.to_string()))
    }
}

impl VerifierChain {
    /// Creates an empty chain, which admits every edge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers another verifier at the end of the chain.
    pub fn register(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifiers.push(verifier);
        self
    }
}

impl Verifier for VerifierChain {
    fn verify(
        &self,
        candidate: &Path,
        signature: &Path,
        descriptor: &Path,
        descriptor_signature: &Path,
    ) -> bool {
        self.verifiers
            .iter()
            .all(|v| v.verify(candidate, signature, descriptor, descriptor_signature))
    }
}

impl Verifier for SignatureVerifier {
    fn verify(
        &self,
        candidate: &Path,
        signature: &Path,
        descriptor: &Path,
        descriptor_signature: &Path,
    ) -> bool {
        for (target, sig) in [(candidate, signature), (descriptor, descriptor_signature)] {
            if let Err(e) = self.check(target, sig) {
                tracing::warn!(
                    target = %target.display(),
                    error = %e,
                    "signature verification failed"
                );
                return false;
            }
        }
        true
    }
}
