use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    jwt::{self, Claims, Decoded},
    key::{Jwk, PublicKey},
};

/// A minimal DID document: the verification methods usable for JWS verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    pub id: String,
    pub verification_method: Vec<VerificationMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub controller: String,
    pub public_key_jwk: Jwk,
}

impl DidDocument {
    /// Find the verification method for `did_url`, or the first one when no fragment is given.
    pub fn find_method(&self, did_url: &str) -> Option<&VerificationMethod> {
        if did_url.contains('#') {
            self.verification_method
                .iter()
                .find(|vm| vm.id == did_url || did_url.ends_with(&vm.id))
        } else {
            self.verification_method.first()
        }
    }
}

#[async_trait]
pub trait DidResolver: std::fmt::Debug + Send + Sync {
    /// Resolve a DID (optionally with a fragment) to its document.
    async fn resolve(&self, did: &str) -> Result<DidDocument>;
}

/// Resolves `did:key` identifiers locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDidResolver;

#[async_trait]
impl DidResolver for KeyDidResolver {
    async fn resolve(&self, did: &str) -> Result<DidDocument> {
        let did = did.split('#').next().unwrap_or(did);
        let key = PublicKey::from_did_key(did)?;
        let fragment = did.trim_start_matches("did:key:");

        Ok(DidDocument {
            id: did.to_string(),
            verification_method: vec![VerificationMethod {
                id: format!("{did}#{fragment}"),
                type_: "JsonWebKey2020".to_string(),
                controller: did.to_string(),
                public_key_jwk: key.to_jwk(),
            }],
        })
    }
}

/// Verify the signature of a compact JWS whose key is identified by the `kid` header or,
/// failing that, the `iss` claim.
///
/// Only the signature is checked: time-based claims are left to the caller.
pub async fn verify_jws(token: &str, resolver: &dyn DidResolver) -> Result<Decoded<Claims>> {
    let decoded: Decoded<Claims> = jwt::decode(token)?;
    let alg = decoded.header.algorithm()?;

    let did_url = match (&decoded.header.kid, &decoded.claims.iss) {
        (Some(kid), _) if kid.starts_with("did:") => kid.clone(),
        (Some(kid), Some(iss)) if kid.starts_with('#') => format!("{iss}{kid}"),
        (_, Some(iss)) => iss.clone(),
        (_, None) => bail!("JWT has neither a DID `kid` nor an `iss` claim"),
    };

    let document = resolver
        .resolve(&did_url)
        .await
        .with_context(|| format!("failed to resolve {did_url}"))?;
    let method = document
        .find_method(&did_url)
        .with_context(|| format!("no verification method {did_url}"))?;

    let key = PublicKey::from_jwk(&method.public_key_jwk)?;
    key.verify(alg, decoded.signing_input.as_bytes(), &decoded.signature)?;

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use base64::prelude::*;

    use super::*;
    use crate::core::{key::KeyType, signer::generate_signer};

    #[tokio::test]
    async fn verifies_tokens_signed_by_did_key() {
        for key_type in [KeyType::Ed25519, KeyType::P256, KeyType::Secp256k1] {
            let signer = generate_signer(key_type);
            let claims = Claims {
                iss: Some(signer.did()),
                ..Default::default()
            };
            let token = jwt::encode("JWT", &claims, signer.as_ref()).await.unwrap();

            let decoded = verify_jws(&token, &KeyDidResolver).await.unwrap();
            assert_eq!(decoded.claims.iss, Some(signer.did()));
        }
    }

    #[tokio::test]
    async fn rejects_tokens_signed_by_another_key() {
        let signer = generate_signer(KeyType::Ed25519);
        let other = generate_signer(KeyType::Ed25519);

        // Claim to be `other` while signing with `signer`.
        let claims = Claims {
            iss: Some(other.did()),
            ..Default::default()
        };
        let token = jwt::encode("JWT", &claims, signer.as_ref()).await.unwrap();
        let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","typ":"JWT"}"#);
        let (_, rest) = token.split_once('.').unwrap();
        let forged = format!("{header}.{rest}");

        assert!(verify_jws(&forged, &KeyDidResolver).await.is_err());
    }

    #[tokio::test]
    async fn resolves_did_key_documents() {
        let signer = generate_signer(KeyType::P256);
        let document = KeyDidResolver.resolve(&signer.key_id()).await.unwrap();
        assert_eq!(document.id, signer.did());
        assert_eq!(
            document.find_method(&signer.key_id()).unwrap().id,
            signer.key_id()
        );
    }
}
