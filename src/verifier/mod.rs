use std::{fmt::Debug, sync::Arc};

use anyhow::bail;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    config::VerifierConfig,
    core::{
        capability::IssuanceCapability,
        did::{DidResolver, KeyDidResolver},
        error::{Error, Result},
        oid4vp::{CreateRequestParams, PresentationResponse, RequestObject, RequestUri, DIRECT_POST, VP_TOKEN},
        presentation_definition::{DefinitionRequirements, PresentationDefinition},
        store::{MemoryTtlStore, TtlStore},
    },
    utils::{generate_id, random_hex},
};

use request::{CreatedRequest, PresentationRequest, RequestSummary};
use session::{PresentationSession, SessionSummary, SubmittedResponse};

pub mod request;
pub mod session;
mod verification;

const REQUEST_ID_LEN: usize = 21;
const NONCE_BYTES: usize = 16;

/// An OpenID4VP verifier.
///
/// Requests and sessions live in [TtlStore]s and are only ever read through them, so an
/// expired request or session is indistinguishable from one that never existed.
#[derive(Debug, Clone)]
pub struct Verifier {
    config: VerifierConfig,
    capability: Arc<dyn IssuanceCapability>,
    resolver: Arc<dyn DidResolver>,
    requests: Arc<dyn TtlStore<PresentationRequest>>,
    /// `state` to request id, for correlating responses.
    states: Arc<dyn TtlStore<String>>,
    sessions: Arc<dyn TtlStore<PresentationSession>>,
}

/// Live record counts, reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub active_requests: usize,
    pub active_sessions: usize,
}

impl Verifier {
    /// Build a new verifier.
    pub fn builder() -> VerifierBuilder {
        VerifierBuilder::default()
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Create a presentation request.
    ///
    /// Without a caller-supplied definition the request asks for any verifiable credential.
    /// A supplied `state` must not belong to another live request.
    pub async fn create_request(&self, params: CreateRequestParams) -> Result<CreatedRequest> {
        let now = Utc::now();
        let ttl = self.config.request_ttl();

        let id = generate_id(REQUEST_ID_LEN);
        let state = params
            .state
            .filter(|state| !state.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        if !self.states.insert_if_absent(&state, id.clone(), ttl).await? {
            return Err(Error::validation("invalid_request")
                .with_detail("state is already used by an active request"));
        }

        let request = PresentationRequest {
            id: id.clone(),
            client_id: params
                .client_id
                .unwrap_or_else(|| self.config.client_id.clone()),
            redirect_uri: params
                .redirect_uri
                .unwrap_or_else(|| self.config.base.endpoint("presentation-response")),
            response_type: params.response_type.unwrap_or_else(|| VP_TOKEN.to_string()),
            response_mode: params.response_mode.unwrap_or_else(|| DIRECT_POST.to_string()),
            presentation_definition: params
                .presentation_definition
                .unwrap_or_else(PresentationDefinition::any_credential),
            nonce: params
                .nonce
                .filter(|nonce| !nonce.is_empty())
                .unwrap_or_else(|| random_hex(NONCE_BYTES)),
            state,
            created_at: now,
            expires_at: now + ttl,
        };
        if let Err(e) = self.requests.put(&id, request.clone(), ttl).await {
            // Release the state so it can be retried.
            self.states.delete(&request.state).await?;
            return Err(e.into());
        }

        let direct_request_url = self.config.base.endpoint(&format!("request/{id}"));
        let request_uri = RequestUri {
            client_id: request.client_id.clone(),
            request_uri: direct_request_url.clone(),
        }
        .to_deep_link()?;

        tracing::info!("created presentation request {id}");
        Ok(CreatedRequest {
            request_id: id,
            request_uri,
            direct_request_url,
            presentation_request: request.to_request_object(),
        })
    }

    /// The request object a wallet dereferences from the request URI.
    pub async fn retrieve_request(&self, id: &str) -> Result<RequestObject> {
        self.requests
            .get(id)
            .await?
            .map(|request| request.to_request_object())
            .ok_or_else(|| {
                Error::not_found("invalid_request").with_detail("request not found or expired")
            })
    }

    /// Verify a presentation response and record the outcome as a session.
    ///
    /// The answered request is consumed, whether or not the presentation is valid. A
    /// `vp_token` that cannot be decoded at all fails without consuming the request.
    pub async fn submit_response(&self, response: PresentationResponse) -> Result<SubmittedResponse> {
        let Some(vp_token) = response.vp_token else {
            return Err(Error::validation("invalid_request").with_detail("vp_token is required"));
        };

        let request = match response.state.as_deref() {
            Some(state) => match self.states.get(state).await? {
                Some(id) => self.requests.get(&id).await?,
                None => None,
            },
            None => None,
        };
        let Some(request) = request else {
            return Err(Error::validation("invalid_request")
                .with_detail("no active request for this state"));
        };

        let verification_result = verification::verify_presentation(
            &request,
            &vp_token,
            response.presentation_submission.as_ref(),
            self.capability.as_ref(),
            self.resolver.as_ref(),
        )
        .await?;

        // Only one response can consume the request.
        if self.requests.delete(&request.id).await?.is_none() {
            return Err(Error::validation("invalid_request").with_detail("request already answered"));
        }
        self.states.delete(&request.state).await?;

        let now = Utc::now();
        let session = PresentationSession {
            session_id: uuid::Uuid::new_v4().to_string(),
            request_id: request.id.clone(),
            verification_result: verification_result.clone(),
            presentation_submission: response.presentation_submission,
            timestamp: now,
            expires_at: now + self.config.session_ttl(),
        };
        self.sessions
            .put(&session.session_id, session.clone(), self.config.session_ttl())
            .await?;

        if verification_result.valid {
            tracing::info!("request {} answered with a valid presentation", request.id);
        } else {
            tracing::warn!(
                "request {} answered with an invalid presentation: {:?}",
                request.id,
                verification_result.errors
            );
        }

        Ok(SubmittedResponse {
            session_id: session.session_id,
            verification_result,
        })
    }

    pub async fn get_session(&self, id: &str) -> Result<PresentationSession> {
        self.sessions
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found("session_not_found"))
    }

    pub async fn list_requests(&self) -> Result<Vec<RequestSummary>> {
        Ok(self
            .requests
            .entries()
            .await?
            .into_iter()
            .map(|(_, request)| request.summary())
            .collect())
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        Ok(self
            .sessions
            .entries()
            .await?
            .into_iter()
            .map(|(_, session)| session.summary())
            .collect())
    }

    /// Build a definition from high level requirements.
    pub fn create_presentation_definition(
        &self,
        requirements: &DefinitionRequirements,
    ) -> PresentationDefinition {
        PresentationDefinition::from_requirements(requirements)
    }

    pub async fn activity(&self) -> Result<Activity> {
        Ok(Activity {
            active_requests: self.requests.entries().await?.len(),
            active_sessions: self.sessions.entries().await?.len(),
        })
    }
}

/// Builder struct for [Verifier].
#[derive(Debug, Clone, Default)]
pub struct VerifierBuilder {
    config: Option<VerifierConfig>,
    capability: Option<Arc<dyn IssuanceCapability>>,
    resolver: Option<Arc<dyn DidResolver>>,
    requests: Option<Arc<dyn TtlStore<PresentationRequest>>>,
    states: Option<Arc<dyn TtlStore<String>>>,
    sessions: Option<Arc<dyn TtlStore<PresentationSession>>>,
}

impl VerifierBuilder {
    /// Build the verifier. Stores not set default to in-memory ones.
    pub fn build(self) -> anyhow::Result<Verifier> {
        let Self {
            config,
            capability,
            resolver,
            requests,
            states,
            sessions,
        } = self;

        let Some(config) = config else {
            bail!("config is required, see `with_config`")
        };

        let Some(capability) = capability else {
            bail!("credential verification capability is required, see `with_capability`")
        };

        Ok(Verifier {
            config,
            capability,
            resolver: resolver.unwrap_or_else(|| Arc::new(KeyDidResolver)),
            requests: requests.unwrap_or_else(|| Arc::new(MemoryTtlStore::new())),
            states: states.unwrap_or_else(|| Arc::new(MemoryTtlStore::new())),
            sessions: sessions.unwrap_or_else(|| Arc::new(MemoryTtlStore::new())),
        })
    }

    pub fn with_config(mut self, config: VerifierConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the capability used to check embedded credentials.
    pub fn with_capability(mut self, capability: Arc<dyn IssuanceCapability>) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Set the resolver for holder DIDs.
    pub fn with_resolver(mut self, resolver: Arc<dyn DidResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the store for pending presentation requests.
    pub fn with_request_store(mut self, requests: Arc<dyn TtlStore<PresentationRequest>>) -> Self {
        self.requests = Some(requests);
        self
    }

    /// Set the store indexing pending requests by `state`.
    pub fn with_state_store(mut self, states: Arc<dyn TtlStore<String>>) -> Self {
        self.states = Some(states);
        self
    }

    pub fn with_session_store(mut self, sessions: Arc<dyn TtlStore<PresentationSession>>) -> Self {
        self.sessions = Some(sessions);
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        config::BaseUrl,
        core::{capability::LocalAgent, signer::KeyManager},
    };

    fn verifier() -> Verifier {
        Verifier::builder()
            .with_config(VerifierConfig::new(
                BaseUrl::try_from("http://verifier.test").unwrap(),
            ))
            .with_capability(Arc::new(LocalAgent::new(KeyManager::new(), "issuer")))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn requests_get_defaults_and_a_deep_link() {
        let verifier = verifier();
        let created = verifier
            .create_request(CreateRequestParams::default())
            .await
            .unwrap();

        assert_eq!(created.request_id.len(), 21);
        assert_eq!(
            created.direct_request_url,
            format!("http://verifier.test/request/{}", created.request_id)
        );
        assert!(created
            .request_uri
            .starts_with("openid4vp://?client_id=verifier-demo&request_uri=http%3A%2F%2F"));

        let object = created.presentation_request;
        assert_eq!(object.response_mode, "direct_post");
        assert_eq!(object.response_type, "vp_token");
        assert_eq!(object.redirect_uri, "http://verifier.test/presentation-response");
        assert_eq!(object.nonce.len(), 32);
        assert_eq!(
            object.presentation_definition.input_descriptors()[0].id(),
            "any_credential"
        );

        assert_eq!(
            verifier.retrieve_request(&created.request_id).await.unwrap(),
            object
        );
        let err = verifier.retrieve_request("missing").await.unwrap_err();
        assert_eq!(err.code(), "invalid_request");
        assert_eq!(err.status(), http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_state_is_rejected_while_active() {
        let verifier = verifier();
        let params = CreateRequestParams {
            state: Some("fixed".into()),
            ..Default::default()
        };
        verifier.create_request(params.clone()).await.unwrap();
        let err = verifier.create_request(params).await.unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[derive(Debug)]
    struct UnavailableStore;

    #[async_trait::async_trait]
    impl TtlStore<PresentationRequest> for UnavailableStore {
        async fn put(&self, _: &str, _: PresentationRequest, _: Duration) -> anyhow::Result<()> {
            bail!("store unavailable")
        }

        async fn insert_if_absent(
            &self,
            _: &str,
            _: PresentationRequest,
            _: Duration,
        ) -> anyhow::Result<bool> {
            bail!("store unavailable")
        }

        async fn get(&self, _: &str) -> anyhow::Result<Option<PresentationRequest>> {
            Ok(None)
        }

        async fn delete(&self, _: &str) -> anyhow::Result<Option<PresentationRequest>> {
            Ok(None)
        }

        async fn entries(&self) -> anyhow::Result<Vec<(String, PresentationRequest)>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn failed_request_write_releases_the_state() {
        let states = Arc::new(MemoryTtlStore::<String>::new());
        let failing = Verifier::builder()
            .with_config(VerifierConfig::new(
                BaseUrl::try_from("http://verifier.test").unwrap(),
            ))
            .with_capability(Arc::new(LocalAgent::new(KeyManager::new(), "issuer")))
            .with_request_store(Arc::new(UnavailableStore))
            .with_state_store(states.clone())
            .build()
            .unwrap();
        let params = CreateRequestParams {
            state: Some("retry-me".into()),
            ..Default::default()
        };

        let err = failing.create_request(params.clone()).await.unwrap_err();
        assert_eq!(err.code(), "server_error");
        assert_eq!(states.get("retry-me").await.unwrap(), None);

        let working = Verifier::builder()
            .with_config(VerifierConfig::new(
                BaseUrl::try_from("http://verifier.test").unwrap(),
            ))
            .with_capability(Arc::new(LocalAgent::new(KeyManager::new(), "issuer")))
            .with_state_store(states)
            .build()
            .unwrap();
        let created = working.create_request(params).await.unwrap();
        assert_eq!(created.presentation_request.state, "retry-me");
    }

    #[tokio::test]
    async fn expired_requests_and_sessions_are_absent() {
        let mut config = VerifierConfig::new(BaseUrl::try_from("http://verifier.test").unwrap());
        config.request_ttl_secs = -1;
        let verifier = Verifier::builder()
            .with_config(config)
            .with_capability(Arc::new(LocalAgent::new(KeyManager::new(), "issuer")))
            .build()
            .unwrap();

        let created = verifier
            .create_request(CreateRequestParams::default())
            .await
            .unwrap();
        assert!(verifier.retrieve_request(&created.request_id).await.is_err());
        assert!(verifier.list_requests().await.unwrap().is_empty());

        let sessions = MemoryTtlStore::<PresentationSession>::new();
        let now = Utc::now();
        sessions
            .put(
                "s",
                PresentationSession {
                    session_id: "s".into(),
                    request_id: "r".into(),
                    verification_result: Default::default(),
                    presentation_submission: None,
                    timestamp: now,
                    expires_at: now,
                },
                Duration::seconds(-1),
            )
            .await
            .unwrap();
        let verifier = Verifier::builder()
            .with_config(VerifierConfig::new(
                BaseUrl::try_from("http://verifier.test").unwrap(),
            ))
            .with_capability(Arc::new(LocalAgent::new(KeyManager::new(), "issuer")))
            .with_session_store(Arc::new(sessions))
            .build()
            .unwrap();
        let err = verifier.get_session("s").await.unwrap_err();
        assert_eq!(err.code(), "session_not_found");
    }

    #[tokio::test]
    async fn responses_need_a_token_and_a_known_state() {
        let verifier = verifier();
        let err = verifier
            .submit_response(PresentationResponse::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_request");

        let err = verifier
            .submit_response(PresentationResponse {
                vp_token: Some("a.b.c".into()),
                presentation_submission: None,
                state: Some("unknown".into()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn undecodable_token_leaves_request_pending() {
        let verifier = verifier();
        let created = verifier
            .create_request(CreateRequestParams::default())
            .await
            .unwrap();

        let err = verifier
            .submit_response(PresentationResponse {
                vp_token: Some("not a jwt".into()),
                presentation_submission: None,
                state: Some(created.presentation_request.state.clone()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_presentation");
        assert_eq!(verifier.activity().await.unwrap().active_requests, 1);
    }
}
