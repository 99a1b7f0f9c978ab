//! Compact JWS encoding and decoding.

use anyhow::{bail, Context, Result};
use base64::prelude::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{key::Algorithm, signer::JwsSigner};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Header {
    pub fn algorithm(&self) -> Result<Algorithm> {
        self.alg.parse()
    }
}

/// `aud` may be a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == value,
            Audience::Many(auds) => auds.iter().any(|aud| aud == value),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Audience::Single(aud) => vec![aud.clone()],
            Audience::Many(auds) => auds.clone(),
        }
    }
}

impl From<&str> for Audience {
    fn from(value: &str) -> Self {
        Audience::Single(value.to_string())
    }
}

/// Registered claims common to proofs, presentations and credentials.
///
/// Any other member is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Whether `exp` is set and lies before `now` (seconds since the epoch).
    pub fn is_expired(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp < now)
    }
}

/// A decoded, unverified compact JWS.
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub header: Header,
    pub claims: T,
    /// `<header>.<payload>` as received.
    pub signing_input: String,
    pub signature: Vec<u8>,
}

/// Decode a compact JWS without verifying its signature.
pub fn decode<T: DeserializeOwned>(token: &str) -> Result<Decoded<T>> {
    let mut parts = token.trim().split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("JWT must have three segments")
    };

    let header_bytes = BASE64_URL_SAFE_NO_PAD
        .decode(header)
        .context("JWT header is not base64url")?;
    let payload_bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload)
        .context("JWT payload is not base64url")?;
    let signature_bytes = BASE64_URL_SAFE_NO_PAD
        .decode(signature)
        .context("JWT signature is not base64url")?;

    Ok(Decoded {
        header: serde_json::from_slice(&header_bytes).context("JWT header is not valid JSON")?,
        claims: serde_json::from_slice(&payload_bytes).context("JWT payload is not valid JSON")?,
        signing_input: format!("{header}.{payload}"),
        signature: signature_bytes,
    })
}

/// Decode only the payload of a compact JWS.
pub fn decode_payload<T: DeserializeOwned>(token: &str) -> Result<T> {
    decode(token).map(|decoded| decoded.claims)
}

/// Sign `payload` with `signer`, producing a compact JWS.
///
/// The header carries the signer's algorithm and key id.
pub async fn encode<T: Serialize>(
    typ: &str,
    payload: &T,
    signer: &dyn JwsSigner,
) -> Result<String> {
    let header = Header {
        alg: signer.algorithm().to_string(),
        typ: Some(typ.to_string()),
        kid: Some(signer.key_id()),
    };

    let header_b64 = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let payload_b64 = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?);
    let signing_input = format!("{header_b64}.{payload_b64}");

    let signature = signer
        .sign(signing_input.as_bytes())
        .await
        .context("failed to sign JWT")?;

    Ok(format!(
        "{signing_input}.{}",
        BASE64_URL_SAFE_NO_PAD.encode(signature)
    ))
}
