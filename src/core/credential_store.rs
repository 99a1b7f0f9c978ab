use std::{fmt::Debug, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::credential::{Credential, ProofFormat};

/// A persisted credential and the fields it can be queried by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    pub hash: String,
    pub credential: Credential,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub issuance_date: Option<String>,
    pub proof_format: ProofFormat,
}

impl StoredCredential {
    pub fn new(credential: Credential) -> Result<Self> {
        let hash = credential_hash(&credential)?;
        Ok(Self {
            hash,
            types: credential.types(),
            issuer: credential.issuer(),
            subject: credential.subject_id(),
            issuance_date: credential.issuance_date(),
            proof_format: credential.proof_format(),
            credential,
        })
    }
}

/// Hex encoded SHA-256 of the serialized credential.
pub fn credential_hash(credential: &Credential) -> Result<String> {
    let bytes = match credential {
        Credential::Compact(token) => token.as_bytes().to_vec(),
        Credential::Structured(map) => {
            serde_json::to_vec(map).context("failed to serialize credential")?
        }
    };
    Ok(format!("{:x}", Sha256::digest(bytes)))
}

/// Filters for [CredentialStore::query]. Every given filter must match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialQuery {
    #[serde(default, alias = "subjectDid")]
    pub subject: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default, rename = "type")]
    pub credential_type: Option<String>,
    #[serde(default = "default_take")]
    pub take: usize,
    #[serde(default)]
    pub skip: usize,
}

fn default_take() -> usize {
    25
}

impl Default for CredentialQuery {
    fn default() -> Self {
        Self {
            subject: None,
            issuer: None,
            credential_type: None,
            take: default_take(),
            skip: 0,
        }
    }
}

impl CredentialQuery {
    pub fn matches(&self, stored: &StoredCredential) -> bool {
        let subject = self
            .subject
            .as_ref()
            .map_or(true, |subject| stored.subject.as_ref() == Some(subject));
        let issuer = self
            .issuer
            .as_ref()
            .map_or(true, |issuer| stored.issuer.as_ref() == Some(issuer));
        let credential_type = self
            .credential_type
            .as_ref()
            .map_or(true, |t| stored.types.contains(t));

        subject && issuer && credential_type
    }
}

/// Persistence of issued or received credentials.
#[async_trait]
pub trait CredentialStore: Debug + Send + Sync {
    /// Store a credential, returning its hash. Saving the same credential twice is a no-op.
    async fn save(&self, credential: Credential) -> Result<String>;

    /// Matching credentials in insertion order, paged by `skip`/`take`.
    async fn query(&self, query: &CredentialQuery) -> Result<Vec<StoredCredential>>;

    async fn get(&self, hash: &str) -> Result<Option<StoredCredential>>;

    /// Every stored credential, in insertion order.
    async fn all(&self) -> Result<Vec<StoredCredential>> {
        self.query(&CredentialQuery {
            take: usize::MAX,
            ..Default::default()
        })
        .await
    }
}

/// A local in-memory store. Not for production use!
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    store: Arc<Mutex<Vec<StoredCredential>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn save(&self, credential: Credential) -> Result<String> {
        let stored = StoredCredential::new(credential)?;
        let hash = stored.hash.clone();

        let mut store = self.store.lock().await;
        if !store.iter().any(|existing| existing.hash == hash) {
            store.push(stored);
        }
        Ok(hash)
    }

    async fn query(&self, query: &CredentialQuery) -> Result<Vec<StoredCredential>> {
        Ok(self
            .store
            .lock()
            .await
            .iter()
            .filter(|stored| query.matches(stored))
            .skip(query.skip)
            .take(query.take)
            .cloned()
            .collect())
    }

    async fn get(&self, hash: &str) -> Result<Option<StoredCredential>> {
        Ok(self
            .store
            .lock()
            .await
            .iter()
            .find(|stored| stored.hash == hash)
            .cloned())
    }
}
