use std::{fmt::Debug, sync::Arc};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    credential::{issuer_id, Credential, ProofFormat},
    did::{verify_jws, DidResolver, KeyDidResolver},
    jwt::{self, Claims},
    key::KeyType,
    signer::KeyManager,
};

/// Outcome of [IssuanceCapability::verify_credential].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialCheck {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CredentialCheck {
    pub fn ok() -> Self {
        Self {
            verified: true,
            error: None,
        }
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            verified: false,
            error: Some(error.to_string()),
        }
    }
}

/// Signs and verifies credentials on behalf of an issuer identity.
#[async_trait]
pub trait IssuanceCapability: Debug + Send + Sync {
    /// The DID credentials are issued under, created on first use.
    async fn issuer_did(&self) -> Result<String>;

    /// Sign an unsigned credential object.
    async fn create_verifiable_credential(
        &self,
        credential: &Value,
        proof_format: ProofFormat,
    ) -> Result<Credential>;

    /// Check the proof of a credential. Never fails: problems are reported in the result.
    async fn verify_credential(&self, credential: &Credential) -> CredentialCheck;
}

/// In-process agent signing JWT-VCs with keys held by a [KeyManager].
#[derive(Clone)]
pub struct LocalAgent {
    keys: KeyManager,
    resolver: Arc<dyn DidResolver>,
    alias: String,
    key_type: KeyType,
}

impl Debug for LocalAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAgent")
            .field("alias", &self.alias)
            .field("key_type", &self.key_type)
            .finish_non_exhaustive()
    }
}

impl LocalAgent {
    /// An agent issuing under the Ed25519 key registered as `alias`.
    pub fn new(keys: KeyManager, alias: impl Into<String>) -> Self {
        Self {
            keys,
            resolver: Arc::new(KeyDidResolver),
            alias: alias.into(),
            key_type: KeyType::Ed25519,
        }
    }

    pub fn with_key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DidResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Verify a JWT-VC and return its normalized credential.
    ///
    /// The signing DID must be the `iss` claim, and the `vc` claim may not name another
    /// issuer or subject than the registered claims do.
    async fn verify_jwt_vc(&self, token: &str) -> Result<Value> {
        let decoded = verify_jws(token, self.resolver.as_ref()).await?;
        let claims = &decoded.claims;
        if claims.is_expired(Utc::now().timestamp()) {
            bail!("credential has expired")
        }

        let Some(iss) = claims.iss.as_deref() else {
            bail!("credential has no `iss` claim")
        };
        let signer = match decoded.header.kid.as_deref() {
            Some(kid) if kid.starts_with("did:") => {
                kid.split_once('#').map_or(kid, |(did, _)| did)
            }
            _ => iss,
        };
        if signer != iss {
            bail!("credential is signed by {signer} but issued by {iss}")
        }

        let Some(vc) = claims.extra.get("vc").filter(|vc| vc.is_object()) else {
            bail!("credential has no `vc` claim")
        };
        if let Some(issuer) = vc.get("issuer").and_then(issuer_id) {
            if issuer != iss {
                bail!("credential names issuer {issuer} but is signed by {iss}")
            }
        }
        let subject = vc
            .get("credentialSubject")
            .and_then(|subject| subject.get("id"))
            .and_then(Value::as_str);
        if let (Some(sub), Some(subject)) = (claims.sub.as_deref(), subject) {
            if sub != subject {
                bail!("credential subject {subject} does not match `sub` {sub}")
            }
        }

        Credential::Compact(token.to_string())
            .to_json()
            .context("credential could not be normalized")
    }

    async fn check_credential(&self, credential: &Credential) -> Result<()> {
        let body = match credential {
            Credential::Compact(token) => return self.verify_jwt_vc(token).await.map(|_| ()),
            Credential::Structured(body) => body,
        };
        let Some(token) = body
            .get("proof")
            .and_then(|proof| proof.get("jwt"))
            .and_then(Value::as_str)
        else {
            bail!("unsupported credential proof")
        };

        // Matching reads the body, so it must agree with the signed JWT.
        let signed = Credential::from(self.verify_jwt_vc(token).await?);
        let body = Credential::Structured(body.clone());
        let subject = |credential: &Credential| {
            credential
                .to_json()
                .and_then(|vc| vc.get("credentialSubject").cloned())
        };
        if body.types() != signed.types()
            || body.issuer() != signed.issuer()
            || subject(&body) != subject(&signed)
        {
            bail!("credential body does not match its proof")
        }
        Ok(())
    }
}

#[async_trait]
impl IssuanceCapability for LocalAgent {
    async fn issuer_did(&self) -> Result<String> {
        Ok(self.keys.get_or_create(&self.alias, self.key_type).await.did())
    }

    async fn create_verifiable_credential(
        &self,
        credential: &Value,
        proof_format: ProofFormat,
    ) -> Result<Credential> {
        if proof_format != ProofFormat::Jwt {
            bail!("proof format {proof_format:?} is not supported")
        }
        let Value::Object(vc) = credential else {
            bail!("credential must be a JSON object")
        };

        let signer = self.keys.get_or_create(&self.alias, self.key_type).await;
        let issuance_date = vc
            .get("issuanceDate")
            .and_then(Value::as_str)
            .map(DateTime::parse_from_rfc3339)
            .transpose()
            .context("issuanceDate is not an RFC 3339 timestamp")?
            .map(|date| date.timestamp())
            .unwrap_or_else(|| Utc::now().timestamp());

        let claims = Claims {
            iss: Some(signer.did()),
            sub: vc
                .get("credentialSubject")
                .and_then(|subject| subject.get("id"))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            nbf: Some(issuance_date),
            jti: vc.get("id").and_then(Value::as_str).map(ToOwned::to_owned),
            extra: Map::from_iter([("vc".to_string(), credential.clone())]),
            ..Default::default()
        };

        let token = jwt::encode("JWT", &claims, signer.as_ref()).await?;
        tracing::debug!("signed credential for {:?}", claims.sub);
        Ok(Credential::Compact(token))
    }

    async fn verify_credential(&self, credential: &Credential) -> CredentialCheck {
        match self.check_credential(credential).await {
            Ok(()) => CredentialCheck::ok(),
            Err(e) => CredentialCheck::failed(format!("{e:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::signer::generate_signer;

    async fn self_signed(vc: Value, sub: Option<&str>) -> (String, String) {
        let signer = generate_signer(KeyType::Ed25519);
        let claims = Claims {
            iss: Some(signer.did()),
            sub: sub.map(ToOwned::to_owned),
            extra: Map::from_iter([("vc".to_string(), vc)]),
            ..Default::default()
        };
        let token = jwt::encode("JWT", &claims, signer.as_ref()).await.unwrap();
        (signer.did(), token)
    }

    #[tokio::test]
    async fn issued_credentials_verify() {
        let agent = LocalAgent::new(KeyManager::new(), "issuer");
        let issuer = agent.issuer_did().await.unwrap();

        let credential = agent
            .create_verifiable_credential(
                &json!({
                    "@context": ["https://www.w3.org/2018/credentials/v1"],
                    "type": ["VerifiableCredential", "DemoCredential"],
                    "issuer": issuer,
                    "issuanceDate": "2024-01-01T00:00:00Z",
                    "credentialSubject": { "id": "did:example:holder", "degree": "CS" }
                }),
                ProofFormat::Jwt,
            )
            .await
            .unwrap();

        assert_eq!(credential.issuer(), Some(issuer));
        assert_eq!(credential.subject_id().as_deref(), Some("did:example:holder"));
        assert_eq!(agent.verify_credential(&credential).await, CredentialCheck::ok());
    }

    #[tokio::test]
    async fn tampered_or_unsupported_credentials_fail_verification() {
        let agent = LocalAgent::new(KeyManager::new(), "issuer");
        let other = LocalAgent::new(KeyManager::new(), "issuer");
        let credential = other
            .create_verifiable_credential(&json!({ "type": ["VerifiableCredential"] }), ProofFormat::Jwt)
            .await
            .unwrap();

        // Verification resolves the embedded did:key, so a foreign issuer still verifies.
        assert!(agent.verify_credential(&credential).await.verified);

        let Credential::Compact(token) = credential else {
            panic!("expected a compact credential")
        };
        let tampered = Credential::Compact(format!("{}x", &token[..token.len() - 1]));
        assert!(!agent.verify_credential(&tampered).await.verified);

        let structured: Credential =
            serde_json::from_value(json!({ "type": ["VerifiableCredential"] })).unwrap();
        let check = agent.verify_credential(&structured).await;
        assert_eq!(check.error.as_deref(), Some("unsupported credential proof"));

        assert!(agent
            .create_verifiable_credential(&json!({}), ProofFormat::Lds)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn signer_must_be_the_named_issuer_and_subject() {
        let agent = LocalAgent::new(KeyManager::new(), "issuer");
        let trusted = agent.issuer_did().await.unwrap();

        let (_, forged) = self_signed(
            json!({ "type": ["VerifiableCredential"], "issuer": { "id": trusted } }),
            None,
        )
        .await;
        let check = agent.verify_credential(&Credential::Compact(forged)).await;
        assert!(!check.verified);
        assert!(check.error.unwrap().contains("names issuer"));

        let (_, reassigned) = self_signed(
            json!({ "type": ["VerifiableCredential"], "credentialSubject": { "id": "did:key:victim" } }),
            Some("did:key:holder"),
        )
        .await;
        let check = agent.verify_credential(&Credential::Compact(reassigned)).await;
        assert!(!check.verified);
        assert!(check.error.unwrap().contains("does not match `sub`"));
    }

    #[tokio::test]
    async fn structured_body_must_match_its_jwt() {
        let agent = LocalAgent::new(KeyManager::new(), "issuer");
        let trusted = agent.issuer_did().await.unwrap();
        let vc = json!({
            "type": ["VerifiableCredential", "DemoCredential"],
            "credentialSubject": { "id": "did:key:holder", "degree": "BSc" }
        });
        let (signer, token) = self_signed(vc, Some("did:key:holder")).await;

        let structured = |issuer: &str, degree: &str| -> Credential {
            serde_json::from_value(json!({
                "type": ["VerifiableCredential", "DemoCredential"],
                "issuer": issuer,
                "credentialSubject": { "id": "did:key:holder", "degree": degree },
                "proof": { "type": "JwtProof2020", "jwt": token },
            }))
            .unwrap()
        };

        assert_eq!(
            agent.verify_credential(&structured(&signer, "BSc")).await,
            CredentialCheck::ok()
        );
        for forged in [structured(&trusted, "BSc"), structured(&signer, "PhD")] {
            let check = agent.verify_credential(&forged).await;
            assert_eq!(
                check.error.as_deref(),
                Some("credential body does not match its proof")
            );
        }
    }
}
