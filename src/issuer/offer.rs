use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    /// Waiting for the holder to redeem the pre-authorized code.
    Created,
    /// A token has been minted from the code.
    Active,
    /// A credential has been issued.
    Redeemed,
    Expired,
}

/// An issuance offer created by the issuer's administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub pre_authorized_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_pin: Option<String>,
    pub schema_id: String,
    pub claims: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub status: OfferStatus,
}

impl Offer {
    pub fn user_pin_required(&self) -> bool {
        self.user_pin.is_some()
    }

    pub fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        ttl.is_some_and(|ttl| self.created_at + ttl < now)
    }
}

/// Storage for offers.
///
/// `transition` is the only way to change an offer's status and must be atomic: it is what
/// makes a pre-authorized code single use.
#[async_trait]
pub trait OfferStore: Debug + Send + Sync {
    async fn insert(&self, offer: Offer) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Offer>>;

    async fn find_by_code(&self, pre_authorized_code: &str) -> Result<Option<Offer>>;

    /// Move offer `id` from `from` to `to`. Returns `false` if the offer is missing or not in
    /// state `from`.
    async fn transition(&self, id: &str, from: OfferStatus, to: OfferStatus) -> Result<bool>;
}

/// A local in-memory store. Not for production use!
#[derive(Debug, Clone, Default)]
pub struct MemoryOfferStore {
    offers: Arc<Mutex<BTreeMap<String, Offer>>>,
}

impl MemoryOfferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OfferStore for MemoryOfferStore {
    async fn insert(&self, offer: Offer) -> Result<()> {
        let mut offers = self.offers.lock().await;
        if offers
            .values()
            .any(|o| o.id == offer.id || o.pre_authorized_code == offer.pre_authorized_code)
        {
            bail!("offer {} already exists", offer.id)
        }
        offers.insert(offer.id.clone(), offer);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Offer>> {
        Ok(self.offers.lock().await.get(id).cloned())
    }

    async fn find_by_code(&self, pre_authorized_code: &str) -> Result<Option<Offer>> {
        Ok(self
            .offers
            .lock()
            .await
            .values()
            .find(|offer| offer.pre_authorized_code == pre_authorized_code)
            .cloned())
    }

    async fn transition(&self, id: &str, from: OfferStatus, to: OfferStatus) -> Result<bool> {
        let mut offers = self.offers.lock().await;
        match offers.get_mut(id) {
            Some(offer) if offer.status == from => {
                offer.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
