use chrono::{Duration, Utc};
use credential_exchange::{
    core::{
        credential_store::CredentialQuery,
        key::KeyType,
        oid4vci::{CredentialRequest, CredentialSubjectRef, ProofObject},
        signer::{generate_signer, JwsSigner},
    },
    holder::proof_builder::ProofBuilder,
};
use http::StatusCode;
use serde_json::json;

mod fixtures;

use fixtures::{claims, fixture, issue_demo, offer, token, token_request, ISSUER_URL};

fn request_with(proof: String, subject: &str) -> CredentialRequest {
    CredentialRequest {
        type_: None,
        format: Some("jwt_vc".into()),
        proof: Some(ProofObject {
            proof_type: Some("jwt".into()),
            jwt: Some(proof),
        }),
        credential_subject: Some(CredentialSubjectRef {
            id: Some(subject.into()),
        }),
    }
}

#[tokio::test]
async fn pre_authorized_code_flow_issues_schema_typed_credential() {
    let fixture = fixture().await;
    let credential = issue_demo(&fixture).await;

    assert!(credential.types().contains(&"DemoCredential".to_string()));
    assert_eq!(credential.subject_id(), Some(fixture.holder.did()));

    let vc = credential.to_json().unwrap();
    assert_eq!(vc["credentialSubject"]["degree"], "CS");
    assert_eq!(vc["@context"], json!(["https://www.w3.org/2018/credentials/v1"]));

    let page = fixture
        .issuer
        .list_issued(&CredentialQuery {
            subject: Some(fixture.holder.did()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.items[0].primary_type.as_deref(), Some("DemoCredential"));

    let stored = fixture.issuer.get_issued(&page.items[0].hash).await.unwrap();
    assert_eq!(stored.credential, credential);
    assert_eq!(
        fixture.issuer.get_issued("missing").await.unwrap_err().code(),
        "not_found"
    );
}

#[tokio::test]
async fn token_requires_the_offer_pin() {
    let fixture = fixture().await;

    for pin in ["1234", "0000", "a-long-pin"] {
        let code = offer(&fixture.issuer, claims(json!({ "degree": "CS" })), Some(pin)).await;

        for wrong in ["", "9999", "1234 "] {
            let err = fixture
                .issuer
                .exchange_token(token_request(&code, Some(wrong)))
                .await
                .unwrap_err();
            assert_eq!(err.code(), "invalid_user_pin");
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
        let err = fixture
            .issuer
            .exchange_token(token_request(&code, None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_user_pin");

        let token = fixture
            .issuer
            .exchange_token(token_request(&code, Some(pin)))
            .await
            .unwrap();
        assert!(!token.access_token.is_empty());
        assert!(!token.c_nonce.is_empty());
    }
}

#[tokio::test]
async fn pre_authorized_code_mints_one_token_under_contention() {
    let fixture = fixture().await;
    let code = offer(&fixture.issuer, claims(json!({ "degree": "CS" })), None).await;

    let (a, b) = tokio::join!(
        fixture.issuer.exchange_token(token_request(&code, None)),
        fixture.issuer.exchange_token(token_request(&code, None)),
    );
    assert!(a.is_ok() ^ b.is_ok());
    let err = a.err().or(b.err()).unwrap();
    assert_eq!(err.code(), "invalid_grant");
}

#[tokio::test]
async fn c_nonce_validates_at_most_one_proof() {
    let fixture = fixture().await;
    let token = token(&fixture.issuer, claims(json!({ "degree": "CS" }))).await;

    let first = fixture
        .holder
        .credential_request(ISSUER_URL, &token.c_nonce, None)
        .await
        .unwrap();
    fixture
        .issuer
        .issue_credential(Some(&token.access_token), first)
        .await
        .unwrap();

    let replay = fixture
        .holder
        .credential_request(ISSUER_URL, &token.c_nonce, None)
        .await
        .unwrap();
    let err = fixture
        .issuer
        .issue_credential(Some(&token.access_token), replay)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_nonce");
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn concurrent_proofs_for_one_nonce_issue_once() {
    let fixture = fixture().await;
    let token = token(&fixture.issuer, claims(json!({ "degree": "CS" }))).await;

    let a = fixture
        .holder
        .credential_request(ISSUER_URL, &token.c_nonce, None)
        .await
        .unwrap();
    let b = fixture
        .holder
        .credential_request(ISSUER_URL, &token.c_nonce, None)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        fixture.issuer.issue_credential(Some(&token.access_token), a),
        fixture.issuer.issue_credential(Some(&token.access_token), b),
    );
    assert!(a.is_ok() ^ b.is_ok());
    assert_eq!(a.err().or(b.err()).unwrap().code(), "invalid_nonce");

    let page = fixture
        .issuer
        .list_issued(&CredentialQuery::default())
        .await
        .unwrap();
    assert_eq!(page.count, 1);
}

#[tokio::test]
async fn proof_binding_failures() {
    let fixture = fixture().await;
    let holder = generate_signer(KeyType::Secp256k1);

    let token = token(&fixture.issuer, claims(json!({ "degree": "CS" }))).await;

    let wrong_nonce = ProofBuilder::new(ISSUER_URL, "not-the-c-nonce")
        .build(holder.as_ref())
        .await
        .unwrap();
    let err = fixture
        .issuer
        .issue_credential(Some(&token.access_token), request_with(wrong_nonce, &holder.did()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_nonce");

    let proof = ProofBuilder::new(ISSUER_URL, &token.c_nonce)
        .build(holder.as_ref())
        .await
        .unwrap();
    let err = fixture
        .issuer
        .issue_credential(
            Some(&token.access_token),
            request_with(proof, &generate_signer(KeyType::Ed25519).did()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "subject_mismatch");

    let stale = ProofBuilder::new(ISSUER_URL, &token.c_nonce)
        .issued_at(Utc::now() - Duration::minutes(6))
        .build(holder.as_ref())
        .await
        .unwrap();
    let err = fixture
        .issuer
        .issue_credential(Some(&token.access_token), request_with(stale, &holder.did()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "proof_expired");

    let elsewhere = ProofBuilder::new("http://other-issuer.test", &token.c_nonce)
        .build(holder.as_ref())
        .await
        .unwrap();
    let err = fixture
        .issuer
        .issue_credential(Some(&token.access_token), request_with(elsewhere, &holder.did()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_proof");

    // None of the failures used up the nonce.
    let proof = ProofBuilder::new(ISSUER_URL, &token.c_nonce)
        .build(holder.as_ref())
        .await
        .unwrap();
    fixture
        .issuer
        .issue_credential(Some(&token.access_token), request_with(proof, &holder.did()))
        .await
        .unwrap();
}

#[tokio::test]
async fn request_shape_is_checked_before_the_proof() {
    let fixture = fixture().await;
    let token = token(&fixture.issuer, claims(json!({ "degree": "CS" }))).await;

    let err = fixture
        .issuer
        .issue_credential(
            Some(&token.access_token),
            CredentialRequest {
                format: Some("ldp_vc".into()),
                ..request_with("x".into(), "did:key:holder")
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unsupported_format");

    let err = fixture
        .issuer
        .issue_credential(
            Some(&token.access_token),
            CredentialRequest {
                proof: None,
                ..request_with("x".into(), "did:key:holder")
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_request");

    let err = fixture
        .issuer
        .issue_credential(Some(&token.access_token), request_with("x".into(), "did:key:holder"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_proof");
}

#[tokio::test]
async fn offer_claims_must_match_the_schema() {
    let fixture = fixture().await;
    let token = token(&fixture.issuer, claims(json!({ "degree": 5 }))).await;

    let request = fixture
        .holder
        .credential_request(ISSUER_URL, &token.c_nonce, None)
        .await
        .unwrap();
    let err = fixture
        .issuer
        .issue_credential(Some(&token.access_token), request)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "claims_invalid");
    let body = err.to_response();
    assert_eq!(body.errors.len(), 1);
}
