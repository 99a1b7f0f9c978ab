//! OpenID for Verifiable Credential Issuance wire types (pre-authorized code flow).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::credential::Credential;

pub const PRE_AUTHORIZED_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:pre-authorized_code";

/// The only credential format issued.
pub const JWT_VC_FORMAT: &str = "jwt_vc";

pub const CREDENTIAL_OFFER_SCHEME: &str = "openid-credential-offer://";

/// `GET /.well-known/openid-credential-issuer`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerMetadata {
    pub credential_issuer: String,
    pub credential_endpoint: String,
    pub token_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_server: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display: Vec<Display>,
    pub credentials_supported: Vec<CredentialSupported>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSupported {
    pub format: String,
    pub types: Vec<String>,
    pub cryptographic_binding_methods_supported: Vec<String>,
    pub cryptographic_suites_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display: Vec<Display>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// `POST /offers`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferRequest {
    /// Schema `$id` or human name.
    #[serde(default)]
    pub schema_id: Option<String>,
    #[serde(default)]
    pub claims: Option<Map<String, Value>>,
    #[serde(default)]
    pub user_pin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOfferResponse {
    pub id: String,
    pub credential_offer_uri: String,
    /// `openid-credential-offer://?credential_offer_uri=...` deep link for wallets.
    pub credential_offer: String,
}

/// The dereferenced credential offer returned by `GET /credential-offer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialOfferObject {
    pub credential_issuer: String,
    pub credential_configuration_ids: Vec<String>,
    pub grants: BTreeMap<String, PreAuthorizedCodeGrant>,
}

impl CredentialOfferObject {
    pub fn pre_authorized_code_grant(&self) -> Option<&PreAuthorizedCodeGrant> {
        self.grants.get(PRE_AUTHORIZED_CODE_GRANT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreAuthorizedCodeGrant {
    #[serde(rename = "pre-authorized_code")]
    pub pre_authorized_code: String,
    #[serde(default)]
    pub user_pin_required: bool,
}

/// `POST /token`, JSON or form encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: Option<String>,
    #[serde(default, rename = "pre-authorized_code")]
    pub pre_authorized_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_pin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub c_nonce: String,
    pub c_nonce_expires_in: i64,
}

/// `POST /credential`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialRequest {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<Value>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub proof: Option<ProofObject>,
    #[serde(default)]
    pub credential_subject: Option<CredentialSubjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofObject {
    #[serde(default)]
    pub proof_type: Option<String>,
    #[serde(default)]
    pub jwt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSubjectRef {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub format: String,
    pub credential: Credential,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn token_requests_use_hyphenated_code_member() {
        let form = "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Apre-authorized_code\
                    &pre-authorized_code=abc&user_pin=1234";
        let request: TokenRequest = serde_urlencoded::from_str(form).unwrap();
        assert_eq!(request.grant_type.as_deref(), Some(PRE_AUTHORIZED_CODE_GRANT));
        assert_eq!(request.pre_authorized_code.as_deref(), Some("abc"));
        assert_eq!(request.user_pin.as_deref(), Some("1234"));
    }

    #[test]
    fn offer_object_exposes_pre_authorized_grant() {
        let offer: CredentialOfferObject = serde_json::from_value(json!({
            "credential_issuer": "http://issuer.test",
            "credential_configuration_ids": ["schema-1"],
            "grants": {
                "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
                    "pre-authorized_code": "code",
                    "user_pin_required": true
                }
            }
        }))
        .unwrap();

        let grant = offer.pre_authorized_code_grant().unwrap();
        assert_eq!(grant.pre_authorized_code, "code");
        assert!(grant.user_pin_required);
    }
}
