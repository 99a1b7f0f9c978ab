//! Credential issuance with the pre-authorized code flow.
//!
//! An administrator registers [schemas](schema::CredentialSchema) and creates [offers](Offer)
//! for them. The holder exchanges the offer's pre-authorized code (and PIN, if any) for an
//! access token and a `c_nonce` challenge at [Issuer::exchange_token], then requests the
//! credential with a proof of possession bound to that challenge at
//! [Issuer::issue_credential].

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::{
    config::IssuerConfig,
    core::{
        capability::IssuanceCapability,
        credential::{ProofFormat, VC_CONTEXT, VERIFIABLE_CREDENTIAL},
        credential_store::{CredentialQuery, CredentialStore, MemoryCredentialStore, StoredCredential},
        did::{DidResolver, KeyDidResolver},
        error::{Error, Result},
        oid4vci::{
            CreateOfferRequest, CreateOfferResponse, CredentialOfferObject, CredentialRequest,
            CredentialResponse, CredentialSupported, Display, IssuerMetadata, PreAuthorizedCodeGrant,
            TokenRequest, TokenResponse, CREDENTIAL_OFFER_SCHEME, JWT_VC_FORMAT,
            PRE_AUTHORIZED_CODE_GRANT,
        },
    },
    utils::generate_id,
};

use issued::{IssuedPage, IssuedSummary};
use offer::{MemoryOfferStore, Offer, OfferStatus, OfferStore};
use schema::{CredentialSchema, MemorySchemaStore, NewSchema, SchemaStore};
use token::{MemoryTokenStore, Token, TokenStore};

pub mod issued;
pub mod offer;
mod proof;
pub mod schema;
pub mod token;

const OFFER_ID_LEN: usize = 21;
const PRE_AUTHORIZED_CODE_LEN: usize = 32;
const ACCESS_TOKEN_LEN: usize = 48;
const C_NONCE_LEN: usize = 24;

const SUPPORTED_SUITES: [&str; 3] = ["EdDSA", "ES256K", "ES256"];

/// An OID4VCI credential issuer.
#[derive(Debug, Clone)]
pub struct Issuer {
    config: IssuerConfig,
    capability: Arc<dyn IssuanceCapability>,
    resolver: Arc<dyn DidResolver>,
    schemas: Arc<dyn SchemaStore>,
    offers: Arc<dyn OfferStore>,
    tokens: Arc<dyn TokenStore>,
    credentials: Arc<dyn CredentialStore>,
}

impl Issuer {
    /// Build a new issuer.
    pub fn builder() -> IssuerBuilder {
        IssuerBuilder::default()
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    /// The issuer identifier: `credential_issuer` in the metadata and the expected `aud` of
    /// proofs.
    pub fn identifier(&self) -> String {
        self.config.base.identifier()
    }

    /// Issuer metadata, with one supported credential per registered schema.
    pub async fn metadata(&self) -> Result<IssuerMetadata> {
        let schemas = self.schemas.list().await?;
        let credentials_supported = schemas
            .into_iter()
            .map(|schema| CredentialSupported {
                format: JWT_VC_FORMAT.to_string(),
                types: vec![VERIFIABLE_CREDENTIAL.to_string(), schema.name.clone()],
                cryptographic_binding_methods_supported: vec!["did".to_string()],
                cryptographic_suites_supported: SUPPORTED_SUITES.map(String::from).to_vec(),
                display: vec![Display {
                    name: schema.name,
                    locale: Some("en-US".to_string()),
                }],
            })
            .collect();

        Ok(IssuerMetadata {
            credential_issuer: self.identifier(),
            credential_endpoint: self.config.base.endpoint("credential"),
            token_endpoint: self.config.base.endpoint("token"),
            authorization_server: Some(self.identifier()),
            display: Vec::new(),
            credentials_supported,
        })
    }

    /// Create an offer for the schema named by `schemaId` (its `$id` or its name).
    pub async fn create_offer(&self, request: CreateOfferRequest) -> Result<CreateOfferResponse> {
        let (Some(schema_id), Some(claims)) = (request.schema_id, request.claims) else {
            return Err(Error::validation("invalid_request").with_detail("schemaId and claims are required"));
        };

        let schema = self
            .schemas
            .find(&schema_id)
            .await?
            .ok_or_else(|| Error::validation("schema_not_found").with_detail(schema_id))?;

        let offer = Offer {
            id: generate_id(OFFER_ID_LEN),
            pre_authorized_code: generate_id(PRE_AUTHORIZED_CODE_LEN),
            user_pin: request.user_pin.filter(|pin| !pin.is_empty()),
            schema_id: schema.id,
            claims,
            created_at: Utc::now(),
            status: OfferStatus::Created,
        };
        let id = offer.id.clone();
        self.offers.insert(offer).await?;

        let credential_offer_uri = format!(
            "{}?{}",
            self.config.base.endpoint("credential-offer"),
            serde_urlencoded::to_string([("offer_id", &id)]).context("failed to encode offer id")?
        );
        let credential_offer = format!(
            "{CREDENTIAL_OFFER_SCHEME}?{}",
            serde_urlencoded::to_string([("credential_offer_uri", &credential_offer_uri)])
                .context("failed to encode offer uri")?
        );

        tracing::info!("created offer {id} for schema {}", schema.name);
        Ok(CreateOfferResponse {
            id,
            credential_offer_uri,
            credential_offer,
        })
    }

    /// The credential offer object a wallet dereferences from the offer URI.
    pub async fn credential_offer(&self, offer_id: Option<&str>) -> Result<CredentialOfferObject> {
        let Some(offer_id) = offer_id.filter(|id| !id.is_empty()) else {
            return Err(Error::validation("invalid_request").with_detail("offer_id is required"));
        };
        let offer = self
            .offers
            .get(offer_id)
            .await?
            .ok_or_else(|| Error::not_found("offer_not_found"))?;

        Ok(CredentialOfferObject {
            credential_issuer: self.identifier(),
            credential_configuration_ids: vec![offer.schema_id.clone()],
            grants: [(
                PRE_AUTHORIZED_CODE_GRANT.to_string(),
                PreAuthorizedCodeGrant {
                    user_pin_required: offer.user_pin_required(),
                    pre_authorized_code: offer.pre_authorized_code,
                },
            )]
            .into(),
        })
    }

    /// Exchange a pre-authorized code for an access token and a `c_nonce`.
    ///
    /// A code mints at most one token. A wrong PIN does not use up the code.
    pub async fn exchange_token(&self, request: TokenRequest) -> Result<TokenResponse> {
        if request.grant_type.as_deref() != Some(PRE_AUTHORIZED_CODE_GRANT) {
            return Err(Error::validation("unsupported_grant_type"));
        }
        let Some(code) = request.pre_authorized_code.filter(|code| !code.is_empty()) else {
            return Err(Error::validation("invalid_request").with_detail("pre-authorized_code is required"));
        };

        let offer = self
            .offers
            .find_by_code(&code)
            .await?
            .ok_or_else(|| Error::validation("invalid_grant"))?;

        let now = Utc::now();
        if offer.status == OfferStatus::Created && offer.is_expired(self.config.offer_ttl(), now) {
            self.offers
                .transition(&offer.id, OfferStatus::Created, OfferStatus::Expired)
                .await?;
            tracing::info!("offer {} expired", offer.id);
            return Err(Error::validation("invalid_grant").with_detail("offer has expired"));
        }

        if let Some(pin) = &offer.user_pin {
            if request.user_pin.as_ref() != Some(pin) {
                return Err(Error::validation("invalid_user_pin"));
            }
        }

        if !self
            .offers
            .transition(&offer.id, OfferStatus::Created, OfferStatus::Active)
            .await?
        {
            tracing::debug!("pre-authorized code of offer {} already used", offer.id);
            return Err(Error::validation("invalid_grant").with_detail("pre-authorized code already used"));
        }

        let token = Token {
            token: generate_id(ACCESS_TOKEN_LEN),
            offer_id: offer.id.clone(),
            created_at: now,
            expires_at: now + self.config.token_ttl(),
            c_nonce: Some(generate_id(C_NONCE_LEN)),
            c_nonce_expires_at: Some(now + self.config.c_nonce_ttl()),
        };
        let response = TokenResponse {
            access_token: token.token.clone(),
            token_type: "bearer".to_string(),
            expires_in: self.config.token_ttl_secs,
            c_nonce: token.c_nonce.clone().unwrap_or_default(),
            c_nonce_expires_in: self.config.c_nonce_ttl_secs,
        };
        self.tokens.insert(token).await?;

        tracing::info!("issued access token for offer {}", offer.id);
        Ok(response)
    }

    /// Issue the offered credential to the holder proving possession of `credential_subject.id`.
    pub async fn issue_credential(
        &self,
        access_token: Option<&str>,
        request: CredentialRequest,
    ) -> Result<CredentialResponse> {
        let now = Utc::now();

        let Some(access_token) = access_token else {
            return Err(Error::auth("invalid_token").with_detail("missing bearer token"));
        };
        let token = self
            .tokens
            .get(access_token)
            .await?
            .ok_or_else(|| Error::auth("invalid_token"))?;
        if token.is_expired(now) {
            return Err(Error::auth("token_expired"));
        }

        if request.format.as_deref() != Some(JWT_VC_FORMAT) {
            return Err(Error::validation("unsupported_format"));
        }

        let proof = request.proof.unwrap_or_default();
        let (Some(proof_jwt), Some(subject_id)) = (
            proof.jwt.filter(|_| proof.proof_type.as_deref().map_or(true, |t| t == "jwt")),
            request.credential_subject.and_then(|subject| subject.id),
        ) else {
            return Err(Error::validation("invalid_request")
                .with_detail("proof.jwt and credential_subject.id are required"));
        };

        let holder = proof::verify_proof(
            &proof_jwt,
            &self.identifier(),
            &token,
            &subject_id,
            self.resolver.as_ref(),
            now,
        )
        .await?;

        let offer = self
            .offers
            .get(&token.offer_id)
            .await?
            .ok_or_else(|| Error::auth("invalid_token").with_detail("offer no longer exists"))?;
        let schema = self
            .schemas
            .get(&offer.schema_id)
            .await?
            .ok_or_else(|| Error::validation("schema_not_found").with_detail(offer.schema_id.clone()))?;
        schema.validate_claims(&offer.claims).map_err(|errors| {
            Error::validation("claims_invalid")
                .with_detail("offer claims do not match the schema")
                .with_errors(errors)
        })?;

        let issuer_did = self.capability.issuer_did().await?;
        let unsigned = unsigned_credential(&schema, &issuer_did, &holder, &offer.claims, now);
        let credential = self
            .capability
            .create_verifiable_credential(&unsigned, ProofFormat::Jwt)
            .await
            .context("failed to sign credential")?;

        // The nonce the proof was checked against.
        let nonce = token.c_nonce.clone().unwrap_or_default();
        if !self.tokens.consume_nonce(&token.token, &nonce).await? {
            tracing::warn!("c_nonce of offer {} consumed concurrently", offer.id);
            return Err(Error::auth("invalid_nonce").with_detail("c_nonce already used"));
        }

        if let Err(e) = self.credentials.save(credential.clone()).await {
            tracing::warn!("failed to persist issued credential: {e:#}");
        }

        if !self
            .offers
            .transition(&offer.id, OfferStatus::Active, OfferStatus::Redeemed)
            .await?
        {
            tracing::debug!("offer {} was not active when redeemed", offer.id);
        }

        tracing::info!("issued {} to {holder}", schema.name);
        Ok(CredentialResponse {
            format: JWT_VC_FORMAT.to_string(),
            credential,
        })
    }

    pub async fn list_schemas(&self) -> Result<Vec<CredentialSchema>> {
        Ok(self.schemas.list().await?)
    }

    pub async fn get_schema(&self, id: &str) -> Result<CredentialSchema> {
        self.schemas
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found("schema_not_found"))
    }

    /// Register a schema. Every field becomes a required property.
    pub async fn create_schema(&self, request: NewSchema) -> Result<CredentialSchema> {
        let (Some(name), Some(fields)) = (request.name.filter(|n| !n.trim().is_empty()), request.fields)
        else {
            return Err(Error::validation("invalid_request").with_detail("name and fields are required"));
        };

        let schema = CredentialSchema::new(name, request.description, &fields);
        schema
            .compile()
            .map_err(|e| Error::validation("invalid_request").with_detail(e.to_string()))?;
        self.schemas.create(schema.clone()).await?;

        tracing::info!("registered schema {} ({})", schema.name, schema.id);
        Ok(schema)
    }

    pub async fn delete_schema(&self, id: &str) -> Result<()> {
        if !self.schemas.delete(id).await? {
            return Err(Error::not_found("schema_not_found"));
        }
        Ok(())
    }

    /// Issued credentials matching `query`, paged.
    pub async fn list_issued(&self, query: &CredentialQuery) -> Result<IssuedPage> {
        let matching = self
            .credentials
            .query(&CredentialQuery {
                take: usize::MAX,
                skip: 0,
                ..query.clone()
            })
            .await?;

        Ok(IssuedPage {
            take: query.take,
            skip: query.skip,
            count: matching.len(),
            items: matching
                .iter()
                .skip(query.skip)
                .take(query.take)
                .map(IssuedSummary::from)
                .collect(),
        })
    }

    pub async fn get_issued(&self, hash: &str) -> Result<StoredCredential> {
        self.credentials
            .get(hash)
            .await?
            .ok_or_else(|| Error::not_found("not_found"))
    }
}

fn unsigned_credential(
    schema: &CredentialSchema,
    issuer_did: &str,
    holder: &str,
    claims: &Map<String, Value>,
    now: chrono::DateTime<Utc>,
) -> Value {
    let mut subject = Map::new();
    subject.insert("id".to_string(), Value::String(holder.to_string()));
    subject.extend(claims.iter().filter(|(k, _)| *k != "id").map(|(k, v)| (k.clone(), v.clone())));

    json!({
        "@context": [VC_CONTEXT],
        "type": [VERIFIABLE_CREDENTIAL, schema.name],
        "issuer": issuer_did,
        "issuanceDate": now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "credentialSubject": subject,
    })
}

/// Builder struct for [Issuer].
///
/// Stores default to the in-memory implementations and DIDs are resolved as `did:key`.
#[derive(Debug, Clone, Default)]
pub struct IssuerBuilder {
    config: Option<IssuerConfig>,
    capability: Option<Arc<dyn IssuanceCapability>>,
    resolver: Option<Arc<dyn DidResolver>>,
    schemas: Option<Arc<dyn SchemaStore>>,
    offers: Option<Arc<dyn OfferStore>>,
    tokens: Option<Arc<dyn TokenStore>>,
    credentials: Option<Arc<dyn CredentialStore>>,
}

impl IssuerBuilder {
    pub fn build(self) -> anyhow::Result<Issuer> {
        let Self {
            config,
            capability,
            resolver,
            schemas,
            offers,
            tokens,
            credentials,
        } = self;

        let Some(config) = config else {
            bail!("config is required, see `with_config`")
        };

        let Some(capability) = capability else {
            bail!("issuance capability is required, see `with_capability`")
        };

        Ok(Issuer {
            config,
            capability,
            resolver: resolver.unwrap_or_else(|| Arc::new(KeyDidResolver)),
            schemas: schemas.unwrap_or_else(|| Arc::new(MemorySchemaStore::new())),
            offers: offers.unwrap_or_else(|| Arc::new(MemoryOfferStore::new())),
            tokens: tokens.unwrap_or_else(|| Arc::new(MemoryTokenStore::new())),
            credentials: credentials.unwrap_or_else(|| Arc::new(MemoryCredentialStore::new())),
        })
    }

    pub fn with_config(mut self, config: IssuerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the capability that signs credentials and names the issuer DID.
    pub fn with_capability(mut self, capability: Arc<dyn IssuanceCapability>) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Set the resolver for holder DIDs in proofs.
    pub fn with_resolver(mut self, resolver: Arc<dyn DidResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_schema_store(mut self, schemas: Arc<dyn SchemaStore>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    pub fn with_offer_store(mut self, offers: Arc<dyn OfferStore>) -> Self {
        self.offers = Some(offers);
        self
    }

    pub fn with_token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Set where issued credentials are recorded.
    pub fn with_credential_store(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }
}
