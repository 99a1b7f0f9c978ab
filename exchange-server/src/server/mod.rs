use std::{sync::Arc, time::Duration};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub mod error;
pub mod extract;
pub mod handlers;
mod state;

pub use state::AppState;

use handlers::{health, issuer, verifier};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Issuance (OID4VCI, pre-authorized code)
        .route(
            "/.well-known/openid-credential-issuer",
            get(issuer::metadata),
        )
        .route("/offers", post(issuer::create_offer))
        .route("/credential-offer", get(issuer::credential_offer))
        .route("/token", post(issuer::token))
        .route("/credential", post(issuer::credential))
        // Schema admin
        .route(
            "/schemas",
            get(issuer::list_schemas).post(issuer::create_schema),
        )
        .route(
            "/schemas/:id",
            get(issuer::get_schema).delete(issuer::delete_schema),
        )
        // Issued credentials
        .route("/issued", get(issuer::list_issued))
        .route("/issued/:hash", get(issuer::get_issued))
        // Presentation (OID4VP)
        .route("/presentation-request", post(verifier::create_request))
        .route("/request/:id", get(verifier::get_request))
        .route("/presentation-response", post(verifier::submit_response))
        .route("/session/:id", get(verifier::get_session))
        .route(
            "/create-presentation-definition",
            post(verifier::create_presentation_definition),
        )
        .route("/requests", get(verifier::list_requests))
        .route("/sessions", get(verifier::list_sessions))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
