#![allow(dead_code)]

use std::sync::Arc;

use credential_exchange::{
    config::{BaseUrl, IssuerConfig, VerifierConfig},
    core::{
        capability::LocalAgent,
        credential::Credential,
        credential_store::MemoryCredentialStore,
        key::KeyType,
        oid4vci::{CreateOfferRequest, TokenRequest, TokenResponse, PRE_AUTHORIZED_CODE_GRANT},
        signer::{generate_signer, KeyManager},
    },
    holder::Holder,
    issuer::{
        schema::{NewSchema, SchemaField},
        Issuer,
    },
    verifier::Verifier,
};
use serde_json::{json, Map, Value};

pub const ISSUER_URL: &str = "http://issuer.test";
pub const VERIFIER_URL: &str = "http://verifier.test";

pub struct Fixture {
    pub issuer: Issuer,
    pub verifier: Verifier,
    pub holder: Holder,
}

pub async fn fixture() -> Fixture {
    let agent = Arc::new(LocalAgent::new(KeyManager::new(), "issuer"));

    let issuer = Issuer::builder()
        .with_config(IssuerConfig::new(BaseUrl::try_from(ISSUER_URL).unwrap()))
        .with_capability(agent.clone())
        .build()
        .unwrap();
    issuer
        .create_schema(NewSchema {
            name: Some("DemoCredential".into()),
            description: Some("A demo degree".into()),
            fields: Some(vec![SchemaField {
                name: "degree".into(),
                type_: "string".into(),
            }]),
        })
        .await
        .unwrap();

    let verifier = Verifier::builder()
        .with_config(VerifierConfig::new(BaseUrl::try_from(VERIFIER_URL).unwrap()))
        .with_capability(agent)
        .build()
        .unwrap();

    let holder = Holder::new(
        generate_signer(KeyType::Ed25519),
        Arc::new(MemoryCredentialStore::new()),
    );

    Fixture {
        issuer,
        verifier,
        holder,
    }
}

pub fn claims(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

/// Create an offer and return its pre-authorized code.
pub async fn offer(issuer: &Issuer, claims: Map<String, Value>, pin: Option<&str>) -> String {
    let created = issuer
        .create_offer(CreateOfferRequest {
            schema_id: Some("DemoCredential".into()),
            claims: Some(claims),
            user_pin: pin.map(String::from),
        })
        .await
        .unwrap();
    issuer
        .credential_offer(Some(&created.id))
        .await
        .unwrap()
        .pre_authorized_code_grant()
        .unwrap()
        .pre_authorized_code
        .clone()
}

pub fn token_request(code: &str, pin: Option<&str>) -> TokenRequest {
    TokenRequest {
        grant_type: Some(PRE_AUTHORIZED_CODE_GRANT.into()),
        pre_authorized_code: Some(code.into()),
        user_pin: pin.map(String::from),
    }
}

pub async fn token(issuer: &Issuer, claims: Map<String, Value>) -> TokenResponse {
    let code = offer(issuer, claims, None).await;
    issuer.exchange_token(token_request(&code, None)).await.unwrap()
}

/// Run the whole issuance flow and store the credential with the holder.
pub async fn issue_demo(fixture: &Fixture) -> Credential {
    let token = token(&fixture.issuer, claims(json!({ "degree": "CS" }))).await;
    let request = fixture
        .holder
        .credential_request(&fixture.issuer.identifier(), &token.c_nonce, Some("DemoCredential"))
        .await
        .unwrap();
    let response = fixture
        .issuer
        .issue_credential(Some(&token.access_token), request)
        .await
        .unwrap();

    fixture
        .holder
        .store_credential(response.credential.clone())
        .await
        .unwrap();
    response.credential
}
