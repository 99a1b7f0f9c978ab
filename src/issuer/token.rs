use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// A bearer token minted from a pre-authorized code, with its proof challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    pub offer_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Cleared once a proof bound to it has been accepted.
    pub c_nonce: Option<String>,
    pub c_nonce_expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// The live challenge, if any.
    pub fn live_nonce(&self, now: DateTime<Utc>) -> Option<&str> {
        match (&self.c_nonce, self.c_nonce_expires_at) {
            (Some(nonce), Some(expires_at)) if now < expires_at => Some(nonce),
            (Some(nonce), None) => Some(nonce),
            _ => None,
        }
    }
}

#[async_trait]
pub trait TokenStore: Debug + Send + Sync {
    async fn insert(&self, token: Token) -> Result<()>;

    async fn get(&self, token: &str) -> Result<Option<Token>>;

    /// Clear the token's `c_nonce` if it still equals `nonce`. Returns whether it did.
    ///
    /// Must be atomic: two callers presenting the same nonce can't both succeed.
    async fn consume_nonce(&self, token: &str, nonce: &str) -> Result<bool>;
}

/// A local in-memory store. Not for production use!
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<Mutex<BTreeMap<String, Token>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, token: Token) -> Result<()> {
        self.tokens.lock().await.insert(token.token.clone(), token);
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<Token>> {
        Ok(self.tokens.lock().await.get(token).cloned())
    }

    async fn consume_nonce(&self, token: &str, nonce: &str) -> Result<bool> {
        let mut tokens = self.tokens.lock().await;
        match tokens.get_mut(token) {
            Some(record) if record.c_nonce.as_deref() == Some(nonce) => {
                record.c_nonce = None;
                record.c_nonce_expires_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
