use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{body::Body, Router};
use credential_exchange::{
    core::{credential_store::MemoryCredentialStore, key::KeyType, signer::generate_signer},
    holder::{client::WalletClient, http::AsyncHttpClient, Holder},
};
use exchange_server::{create_router, AppState, Config};
use http::{header, Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

const PUBLIC_URL: &str = "http://exchange.test";

fn app() -> Router {
    let config = Config::new(PUBLIC_URL.parse().unwrap());
    create_router(Arc::new(AppState::new(config).unwrap()))
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn register_demo_schema(app: &Router) {
    let (status, body) = call(
        app,
        post_json(
            "/schemas",
            json!({
                "name": "DemoCredential",
                "fields": [{ "name": "degree", "type": "string" }],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["schema"]["name"], "DemoCredential");
}

/// Drives the router in process, so the wallet client can run against it.
struct RouterClient(Router);

#[async_trait]
impl AsyncHttpClient for RouterClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let response = self.0.clone().oneshot(request.map(Body::from)).await?;
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await?;
        Ok(Response::from_parts(parts, body.to_vec()))
    }
}

#[tokio::test]
async fn health_reports_activity() {
    let app = app();
    let (status, body) = call(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["active_requests"], 0);
    assert_eq!(body["active_sessions"], 0);

    call(&app, post_json("/presentation-request", json!({}))).await;
    let (_, body) = call(&app, get("/health")).await;
    assert_eq!(body["active_requests"], 1);
}

#[tokio::test]
async fn metadata_lists_registered_schemas() {
    let app = app();
    register_demo_schema(&app).await;

    let (status, metadata) = call(&app, get("/.well-known/openid-credential-issuer")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metadata["credential_issuer"], PUBLIC_URL);
    assert_eq!(metadata["token_endpoint"], "http://exchange.test/token");
    assert_eq!(
        metadata["credentials_supported"][0]["types"],
        json!(["VerifiableCredential", "DemoCredential"])
    );

    let (_, body) = call(&app, get("/schemas")).await;
    let id = body["schemas"][0]["$id"].as_str().unwrap().to_string();
    let (status, _) = call(&app, get(&format!("/schemas/{id}"))).await;
    assert_eq!(status, StatusCode::OK);

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/schemas/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&app, get(&format!("/schemas/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "schema_not_found");
}

#[tokio::test]
async fn token_endpoint_accepts_forms_and_reports_error_codes() {
    let app = app();
    register_demo_schema(&app).await;

    let (status, created) = call(
        &app,
        post_json(
            "/offers",
            json!({ "schemaId": "DemoCredential", "claims": { "degree": "CS" }, "userPin": "1234" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(created["credential_offer"]
        .as_str()
        .unwrap()
        .starts_with("openid-credential-offer://?credential_offer_uri="));

    let (status, offer) = call(
        &app,
        get(&format!("/credential-offer?offer_id={}", created["id"].as_str().unwrap())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let code = offer["grants"]["urn:ietf:params:oauth:grant-type:pre-authorized_code"]
        ["pre-authorized_code"]
        .as_str()
        .unwrap()
        .to_string();

    let form = |pin: &str| {
        Request::post("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(
                serde_urlencoded::to_string([
                    ("grant_type", "urn:ietf:params:oauth:grant-type:pre-authorized_code"),
                    ("pre-authorized_code", code.as_str()),
                    ("user_pin", pin),
                ])
                .unwrap(),
            ))
            .unwrap()
    };

    let (status, body) = call(&app, form("0000")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_user_pin");

    let (status, token) = call(&app, form("1234")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(token["token_type"], "bearer");

    let (status, body) = call(&app, form("1234")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");

    let (status, body) = call(&app, get("/credential-offer?offer_id=missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "offer_not_found");
}

#[tokio::test]
async fn credential_endpoint_requires_a_bearer_token() {
    let app = app();

    let (status, body) = call(
        &app,
        post_json("/credential", json!({ "format": "jwt_vc" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");

    let request = Request::post("/credential")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::from(json!({ "format": "jwt_vc" }).to_string()))
        .unwrap();
    let (status, body) = call(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn wallet_round_trip_over_http() {
    let app = app();
    register_demo_schema(&app).await;
    let client = WalletClient::new(Arc::new(RouterClient(app.clone())));
    let holder = Holder::new(
        generate_signer(KeyType::P256),
        Arc::new(MemoryCredentialStore::new()),
    );

    let (_, created) = call(
        &app,
        post_json(
            "/offers",
            json!({ "schemaId": "DemoCredential", "claims": { "degree": "CS" } }),
        ),
    )
    .await;
    holder
        .receive_offer(&client, created["credential_offer"].as_str().unwrap(), None)
        .await
        .unwrap();

    let (_, issued) = call(
        &app,
        get(&format!("/issued?subjectDid={}", holder.did())),
    )
    .await;
    assert_eq!(issued["count"], 1);
    assert_eq!(issued["items"][0]["primaryType"], "DemoCredential");

    let (status, request) = call(
        &app,
        post_json(
            "/create-presentation-definition",
            json!({ "credential_types": ["DemoCredential"], "required_fields": ["degree"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, created) = call(
        &app,
        post_json(
            "/presentation-request",
            json!({ "presentation_definition": request["presentation_definition"] }),
        ),
    )
    .await;

    let submitted = holder
        .respond_to_request(&client, created["request_uri"].as_str().unwrap())
        .await
        .unwrap();
    assert!(
        submitted.verification_result.valid,
        "{:?}",
        submitted.verification_result.errors
    );

    let (status, body) = call(&app, get(&format!("/session/{}", submitted.session_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["verification_result"]["valid"], true);

    let (_, sessions) = call(&app, get("/sessions")).await;
    assert_eq!(sessions["count"], 1);
    let (_, requests) = call(&app, get("/requests")).await;
    assert_eq!(requests["count"], 0);

    let (status, body) = call(
        &app,
        get(&format!("/request/{}", created["request_id"].as_str().unwrap())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "invalid_request");
}
