use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};

use crate::core::{
    credential::{Credential, VC_CONTEXT},
    jwt::{self, Claims},
    signer::JwsSigner,
};

pub const VERIFIABLE_PRESENTATION: &str = "VerifiablePresentation";

/// Seconds a proof stays valid after it is issued.
pub const DEFAULT_PROOF_LIFETIME_SECS: i64 = 300;

/// Builds the signed proofs a holder sends: the proof of possession for a credential request,
/// and the JWT verifiable presentation for a presentation response.
///
/// The issuer (`iss`) and subject (`sub`) of the proof are both the holder DID, taken from
/// the signer.
#[derive(Debug, Clone)]
pub struct ProofBuilder {
    audience: String,
    nonce: String,
    issued_at: Option<DateTime<Utc>>,
    lifetime: Duration,
    credentials: Option<Vec<Credential>>,
}

impl ProofBuilder {
    /// A proof addressed to `audience` (the issuer identifier or the verifier's `client_id`),
    /// bound to the challenge `nonce`.
    pub fn new(audience: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            nonce: nonce.into(),
            issued_at: None,
            lifetime: Duration::seconds(DEFAULT_PROOF_LIFETIME_SECS),
            credentials: None,
        }
    }

    /// Set the issuance time. Defaults to the time of signing.
    pub fn issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = Some(issued_at);
        self
    }

    /// Set how long the proof stays valid.
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Turn the proof into a verifiable presentation of `credentials`.
    pub fn with_credentials(mut self, credentials: Vec<Credential>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// The payload for a holder identified by `holder`.
    pub fn claims(&self, holder: &str) -> Claims {
        let iat = self.issued_at.unwrap_or_else(Utc::now);

        let mut extra = Map::new();
        if let Some(credentials) = &self.credentials {
            extra.insert(
                "vp".to_string(),
                json!({
                    "@context": [VC_CONTEXT],
                    "type": [VERIFIABLE_PRESENTATION],
                    "holder": holder,
                    "verifiableCredential": credentials
                        .iter()
                        .map(Credential::to_wire)
                        .collect::<Vec<Value>>(),
                }),
            );
        }

        Claims {
            iss: Some(holder.to_string()),
            sub: Some(holder.to_string()),
            aud: Some(self.audience.as_str().into()),
            iat: Some(iat.timestamp()),
            nbf: Some(iat.timestamp()),
            exp: Some((iat + self.lifetime).timestamp()),
            nonce: Some(self.nonce.clone()),
            jti: Some(uuid::Uuid::new_v4().to_string()),
            extra,
        }
    }

    /// Sign the proof. The header carries the signer's algorithm and `kid`.
    pub async fn build(&self, signer: &dyn JwsSigner) -> Result<String> {
        let claims = self.claims(&signer.did());
        tracing::debug!(
            "signing {} for {}",
            if self.credentials.is_some() { "presentation" } else { "proof" },
            self.audience
        );
        jwt::encode("JWT", &claims, signer).await
    }
}
