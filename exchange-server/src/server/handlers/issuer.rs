use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use credential_exchange::{
    core::{
        credential_store::{CredentialQuery, StoredCredential},
        oid4vci::{
            CreateOfferRequest, CreateOfferResponse, CredentialOfferObject, CredentialRequest,
            CredentialResponse, IssuerMetadata, TokenRequest, TokenResponse,
        },
    },
    issuer::{issued::IssuedPage, schema::NewSchema},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::server::{
    error::AppError,
    extract::{BearerToken, JsonOrForm},
    AppState,
};

/// GET /.well-known/openid-credential-issuer
pub async fn metadata(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IssuerMetadata>, AppError> {
    Ok(Json(state.issuer.metadata().await?))
}

/// POST /offers
pub async fn create_offer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateOfferRequest>,
) -> Result<Json<CreateOfferResponse>, AppError> {
    let created = state.issuer.create_offer(request).await?;
    info!("Created credential offer {}", created.id);
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
pub struct OfferQuery {
    pub offer_id: Option<String>,
}

/// GET /credential-offer?offer_id=
pub async fn credential_offer(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OfferQuery>,
) -> Result<Json<CredentialOfferObject>, AppError> {
    Ok(Json(
        state
            .issuer
            .credential_offer(query.offer_id.as_deref())
            .await?,
    ))
}

/// POST /token
pub async fn token(
    State(state): State<Arc<AppState>>,
    JsonOrForm(request): JsonOrForm<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    Ok(Json(state.issuer.exchange_token(request).await?))
}

/// POST /credential
pub async fn credential(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    Json(request): Json<CredentialRequest>,
) -> Result<Json<CredentialResponse>, AppError> {
    Ok(Json(
        state
            .issuer
            .issue_credential(token.as_deref(), request)
            .await?,
    ))
}

/// GET /schemas
pub async fn list_schemas(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let schemas = state.issuer.list_schemas().await?;
    Ok(Json(json!({ "schemas": schemas })))
}

/// POST /schemas
pub async fn create_schema(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewSchema>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let schema = state.issuer.create_schema(request).await?;
    info!("Registered schema {} ({})", schema.name, schema.id);
    Ok((StatusCode::CREATED, Json(json!({ "schema": schema }))))
}

/// GET /schemas/:id
pub async fn get_schema(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let schema = state.issuer.get_schema(&id).await?;
    Ok(Json(json!({ "schema": schema })))
}

/// DELETE /schemas/:id
pub async fn delete_schema(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.issuer.delete_schema(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /issued?subjectDid&issuer&type&take&skip
pub async fn list_issued(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CredentialQuery>,
) -> Result<Json<IssuedPage>, AppError> {
    Ok(Json(state.issuer.list_issued(&query).await?))
}

/// GET /issued/:hash
pub async fn get_issued(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<StoredCredential>, AppError> {
    Ok(Json(state.issuer.get_issued(&hash).await?))
}
