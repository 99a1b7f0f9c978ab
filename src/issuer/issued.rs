use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::credential::ProofFormat;
use crate::core::credential_store::StoredCredential;

/// One row of the issued-credentials listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSummary {
    pub hash: String,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    /// The most specific type: the second entry, after `VerifiableCredential`.
    pub primary_type: Option<String>,
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub issuance_date: Option<String>,
    pub expiration_date: Option<String>,
    pub proof_format: ProofFormat,
}

impl From<&StoredCredential> for IssuedSummary {
    fn from(stored: &StoredCredential) -> Self {
        let expiration_date = stored
            .credential
            .to_json()
            .and_then(|vc| vc.get("expirationDate").and_then(Value::as_str).map(String::from));

        Self {
            hash: stored.hash.clone(),
            primary_type: stored.types.get(1).or(stored.types.first()).cloned(),
            types: stored.types.clone(),
            issuer: stored.issuer.clone(),
            subject: stored.subject.clone(),
            issuance_date: stored.issuance_date.clone(),
            expiration_date,
            proof_format: stored.proof_format,
        }
    }
}

/// A page of [IssuedSummary] rows. `count` is the number of matches before paging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedPage {
    pub take: usize,
    pub skip: usize,
    pub count: usize,
    pub items: Vec<IssuedSummary>,
}
