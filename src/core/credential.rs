use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::jwt;

pub const VC_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const VERIFIABLE_CREDENTIAL: &str = "VerifiableCredential";

/// Proof formats the issuance capability can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofFormat {
    Jwt,
    Lds,
}

/// A verifiable credential, either compact (a signed JWT-VC) or structured (JSON-LD shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credential {
    Compact(String),
    Structured(Map<String, Value>),
}

impl Credential {
    /// The structured view of the credential.
    ///
    /// A compact JWT-VC is decoded (without verification) and its registered claims are
    /// folded into the `vc` claim. Returns `None` for compact credentials that cannot be
    /// decoded.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Credential::Structured(map) => Some(Value::Object(map.clone())),
            Credential::Compact(token) => normalize_jwt_vc(token),
        }
    }

    pub fn types(&self) -> Vec<String> {
        self.to_json()
            .and_then(|vc| match vc.get("type")? {
                Value::String(t) => Some(vec![t.clone()]),
                Value::Array(types) => Some(
                    types
                        .iter()
                        .filter_map(|t| t.as_str().map(ToOwned::to_owned))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// The issuer identifier. An issuer given as an object yields its `id`.
    pub fn issuer(&self) -> Option<String> {
        issuer_id(self.to_json()?.get("issuer")?).map(ToOwned::to_owned)
    }

    pub fn subject_id(&self) -> Option<String> {
        self.to_json()?
            .get("credentialSubject")?
            .get("id")?
            .as_str()
            .map(ToOwned::to_owned)
    }

    pub fn issuance_date(&self) -> Option<String> {
        self.to_json()?
            .get("issuanceDate")?
            .as_str()
            .map(ToOwned::to_owned)
    }

    pub fn proof_format(&self) -> ProofFormat {
        match self {
            Credential::Compact(_) => ProofFormat::Jwt,
            Credential::Structured(map) => {
                let is_jwt = map
                    .get("proof")
                    .and_then(|proof| proof.get("jwt"))
                    .is_some();
                if is_jwt {
                    ProofFormat::Jwt
                } else {
                    ProofFormat::Lds
                }
            }
        }
    }

    /// The serialized form: the JWT itself for compact credentials, JSON otherwise.
    pub fn to_wire(&self) -> Value {
        match self {
            Credential::Compact(token) => Value::String(token.clone()),
            Credential::Structured(map) => Value::Object(map.clone()),
        }
    }
}

impl From<Value> for Credential {
    fn from(value: Value) -> Self {
        match value {
            Value::String(token) => Credential::Compact(token),
            Value::Object(map) => Credential::Structured(map),
            other => Credential::Structured(Map::from_iter([("value".to_string(), other)])),
        }
    }
}

/// The identifier of a VC `issuer` member, given either as a string or as an object.
pub(crate) fn issuer_id(issuer: &Value) -> Option<&str> {
    match issuer {
        Value::String(issuer) => Some(issuer),
        Value::Object(issuer) => issuer.get("id")?.as_str(),
        _ => None,
    }
}

/// The `vc` claim with the registered claims folded in. `iss`, `sub` and `jti` take
/// precedence over the members they map to.
fn normalize_jwt_vc(token: &str) -> Option<Value> {
    let claims: jwt::Claims = jwt::decode_payload(token).ok()?;
    let mut vc = match claims.extra.get("vc") {
        Some(Value::Object(vc)) => vc.clone(),
        _ => Map::new(),
    };

    if let Some(iss) = claims.iss {
        match vc.get_mut("issuer") {
            Some(Value::Object(issuer)) => {
                issuer.insert("id".to_string(), Value::String(iss));
            }
            _ => {
                vc.insert("issuer".to_string(), Value::String(iss));
            }
        }
    }
    if let Some(sub) = claims.sub {
        let subject = vc
            .entry("credentialSubject")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(subject) = subject {
            subject.insert("id".to_string(), Value::String(sub));
        }
    }
    if let Some(date) = claims
        .nbf
        .and_then(|nbf| Utc.timestamp_opt(nbf, 0).single())
    {
        vc.entry("issuanceDate")
            .or_insert(Value::String(date.to_rfc3339()));
    }
    if let Some(jti) = claims.jti {
        vc.insert("id".to_string(), Value::String(jti));
    }

    Some(Value::Object(vc))
}
