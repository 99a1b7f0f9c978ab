use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::key::{Algorithm, KeyType, PublicKey};

/// Produces JWS signatures on behalf of a `did:key` identity.
#[async_trait]
pub trait JwsSigner: Debug + Send + Sync {
    /// The algorithm that will be used to sign.
    fn algorithm(&self) -> Algorithm;
    /// The public key of the signer.
    fn public_key(&self) -> PublicKey;
    /// Sign `payload`, returning the raw JWS signature bytes.
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;

    /// The DID controlling this key.
    fn did(&self) -> String {
        self.public_key().to_did_key()
    }

    /// The verification method id placed in the `kid` header.
    fn key_id(&self) -> String {
        let did = self.did();
        let fragment = did.trim_start_matches("did:key:");
        format!("{did}#{fragment}")
    }
}

#[derive(Debug)]
pub struct Ed25519Signer {
    key: ed25519_dalek::SigningKey,
}

impl Ed25519Signer {
    pub fn new(key: ed25519_dalek::SigningKey) -> Self {
        Self { key }
    }

    pub fn generate() -> Self {
        Self::new(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }
}

#[async_trait]
impl JwsSigner for Ed25519Signer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::EdDSA
    }

    fn public_key(&self) -> PublicKey {
        PublicKey::Ed25519(self.key.verifying_key())
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        use ed25519_dalek::Signer;
        Ok(self.key.sign(payload).to_bytes().to_vec())
    }
}

#[derive(Debug)]
pub struct P256Signer {
    key: p256::ecdsa::SigningKey,
}

impl P256Signer {
    pub fn new(key: p256::ecdsa::SigningKey) -> Self {
        Self { key }
    }

    pub fn generate() -> Self {
        Self::new(p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng))
    }
}

#[async_trait]
impl JwsSigner for P256Signer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ES256
    }

    fn public_key(&self) -> PublicKey {
        PublicKey::P256(*self.key.verifying_key())
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        use p256::ecdsa::{signature::Signer, Signature};
        let sig: Signature = self.key.sign(payload);
        Ok(sig.to_vec())
    }
}

#[derive(Debug)]
pub struct Secp256k1Signer {
    key: k256::ecdsa::SigningKey,
}

impl Secp256k1Signer {
    pub fn new(key: k256::ecdsa::SigningKey) -> Self {
        Self { key }
    }

    pub fn generate() -> Self {
        Self::new(k256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng))
    }
}

#[async_trait]
impl JwsSigner for Secp256k1Signer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ES256K
    }

    fn public_key(&self) -> PublicKey {
        PublicKey::Secp256k1(*self.key.verifying_key())
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        use k256::ecdsa::{signature::Signer, Signature};
        let sig: Signature = self.key.sign(payload);
        Ok(sig.to_vec())
    }
}

/// Generate a fresh signer of the given key type.
pub fn generate_signer(key_type: KeyType) -> Arc<dyn JwsSigner> {
    match key_type {
        KeyType::Ed25519 => Arc::new(Ed25519Signer::generate()),
        KeyType::P256 => Arc::new(P256Signer::generate()),
        KeyType::Secp256k1 => Arc::new(Secp256k1Signer::generate()),
    }
}

/// In-memory registry of named signing keys.
#[derive(Debug, Clone, Default)]
pub struct KeyManager {
    keys: Arc<Mutex<BTreeMap<String, Arc<dyn JwsSigner>>>>,
}

impl KeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the key registered under `alias`, generating one of `key_type` if absent.
    pub async fn get_or_create(&self, alias: &str, key_type: KeyType) -> Arc<dyn JwsSigner> {
        let mut keys = self.keys.lock().await;
        keys.entry(alias.to_string())
            .or_insert_with(|| {
                tracing::debug!("generating {key_type:?} key for alias {alias}");
                generate_signer(key_type)
            })
            .clone()
    }

    pub async fn get(&self, alias: &str) -> Option<Arc<dyn JwsSigner>> {
        self.keys.lock().await.get(alias).cloned()
    }

    pub async fn insert(&self, alias: &str, signer: Arc<dyn JwsSigner>) {
        self.keys.lock().await.insert(alias.to_string(), signer);
    }
}
