//! Validator key stores.
//!
//! Key material is an injected capability: the ledger receives a [`KeyStore`]
//! at construction instead of reaching into the filesystem itself.
//! [`DirKeyStore`] is the production implementation with one directory per
//! validator; [`MemoryKeyStore`] backs embedded use and tests.

use crate::crypto::{CryptoError, Keypair, PublicKey};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or generating key material.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("no key material for validator {0:?}")]
    MissingKey(String),

    #[error("invalid key encoding for validator {id:?}")]
    InvalidKey {
        id: String,
        #[source]
        source: CryptoError,
    },

    #[error("malformed base64 key file for validator {0:?}")]
    MalformedKeyFile(String),

    #[error("i/o error accessing key store: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, KeyStoreError>;

/// Source of validator key material.
pub trait KeyStore {
    /// Load the signing keypair for one validator id.
    fn load_keypair(&self, id: &str) -> Result<Keypair>;

    /// Load the full registry of validator public keys, keyed by id.
    fn load_public_keys(&self) -> Result<HashMap<String, PublicKey>>;
}

/// Filesystem key store: `<root>/<validator_id>/{private.key,public.key}`,
/// each file a base64-encoded 32-byte Ed25519 seed / verifying key.
#[derive(Debug, Clone)]
pub struct DirKeyStore {
    root: PathBuf,
}

impl DirKeyStore {
    /// Create a key store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Generate a fresh keypair for `id` and persist both halves.
    pub fn generate_validator(&self, id: &str) -> Result<Keypair> {
        let keypair = Keypair::generate();
        let dir = self.root.join(id);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("private.key"), BASE64.encode(keypair.seed()))?;
        fs::write(dir.join("public.key"), keypair.public_key.to_base64())?;
        Ok(keypair)
    }

    fn read_base64(&self, path: &Path, id: &str) -> Result<Vec<u8>> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => KeyStoreError::MissingKey(id.to_string()),
            _ => KeyStoreError::Io(e),
        })?;
        BASE64
            .decode(text.trim())
            .map_err(|_| KeyStoreError::MalformedKeyFile(id.to_string()))
    }
}

impl KeyStore for DirKeyStore {
    fn load_keypair(&self, id: &str) -> Result<Keypair> {
        let bytes = self.read_base64(&self.root.join(id).join("private.key"), id)?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyStoreError::MalformedKeyFile(id.to_string()))?;
        Ok(Keypair::from_seed(&seed))
    }

    fn load_public_keys(&self) -> Result<HashMap<String, PublicKey>> {
        let mut registry = HashMap::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let key_path = entry.path().join("public.key");
            if !key_path.exists() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            let bytes = self.read_base64(&key_path, &id)?;
            let arr: [u8; 32] = bytes
                .try_into()
                .map_err(|_| KeyStoreError::MalformedKeyFile(id.clone()))?;
            let key = PublicKey::from_bytes(&arr)
                .map_err(|source| KeyStoreError::InvalidKey { id: id.clone(), source })?;
            registry.insert(id, key);
        }
        Ok(registry)
    }
}

/// In-process key store for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    keypairs: HashMap<String, Keypair>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a keypair under a validator id, returning self for chaining.
    pub fn with_keypair(mut self, id: impl Into<String>, keypair: Keypair) -> Self {
        self.keypairs.insert(id.into(), keypair);
        self
    }

    /// Generate and register a fresh keypair for `id`.
    pub fn generate(&mut self, id: impl Into<String>) -> Keypair {
        let keypair = Keypair::generate();
        self.keypairs.insert(id.into(), keypair.clone());
        keypair
    }
}

impl KeyStore for MemoryKeyStore {
    fn load_keypair(&self, id: &str) -> Result<Keypair> {
        self.keypairs
            .get(id)
            .cloned()
            .ok_or_else(|| KeyStoreError::MissingKey(id.to_string()))
    }

    fn load_public_keys(&self) -> Result<HashMap<String, PublicKey>> {
        Ok(self
            .keypairs
            .iter()
            .map(|(id, kp)| (id.clone(), kp.public_key.clone()))
            .collect())
    }
}
