//! The holder (wallet) role.
//!
//! A [Holder] owns a signing key and a [CredentialStore]. It redeems credential offers, picks
//! stored credentials for presentation requests with the matching engine and answers them with
//! a signed JWT presentation.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::{
    core::{
        credential::Credential,
        credential_store::CredentialStore,
        matching::{evaluate_with_hashes, SelectedCredential},
        oid4vci::{CredentialRequest, CredentialSubjectRef, ProofObject, JWT_VC_FORMAT},
        oid4vp::{PresentationResponse, RequestObject},
        presentation_definition::PresentationDefinition,
        presentation_submission::{DescriptorMap, PresentationSubmission},
        signer::JwsSigner,
    },
    verifier::session::SubmittedResponse,
};

use client::WalletClient;
use proof_builder::ProofBuilder;

pub mod client;
pub mod http;
pub mod proof_builder;

#[derive(Debug, Clone)]
pub struct Holder {
    signer: Arc<dyn JwsSigner>,
    credentials: Arc<dyn CredentialStore>,
}

impl Holder {
    pub fn new(signer: Arc<dyn JwsSigner>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            signer,
            credentials,
        }
    }

    /// The holder DID: the subject of issued credentials and the issuer of presentations.
    pub fn did(&self) -> String {
        self.signer.did()
    }

    pub async fn store_credential(&self, credential: Credential) -> Result<String> {
        let hash = self.credentials.save(credential).await?;
        tracing::debug!("stored credential {hash}");
        Ok(hash)
    }

    /// Stored credentials that satisfy `definition`, in storage order.
    pub async fn evaluate_request(
        &self,
        definition: &PresentationDefinition,
    ) -> Result<Vec<SelectedCredential>> {
        let stored = self.credentials.all().await?;
        Ok(evaluate_with_hashes(
            stored
                .iter()
                .map(|stored| (&stored.credential, Some(stored.hash.clone()))),
            definition,
        ))
    }

    /// A credential request carrying a proof of possession for `c_nonce`, addressed to
    /// `credential_issuer`.
    pub async fn credential_request(
        &self,
        credential_issuer: &str,
        c_nonce: &str,
        credential_type: Option<&str>,
    ) -> Result<CredentialRequest> {
        let jwt = ProofBuilder::new(credential_issuer, c_nonce)
            .build(self.signer.as_ref())
            .await?;

        Ok(CredentialRequest {
            type_: credential_type.map(|t| Value::String(t.to_string())),
            format: Some(JWT_VC_FORMAT.to_string()),
            proof: Some(ProofObject {
                proof_type: Some("jwt".to_string()),
                jwt: Some(jwt),
            }),
            credential_subject: Some(CredentialSubjectRef {
                id: Some(self.did()),
            }),
        })
    }

    /// Answer `request` with the `selected` credentials.
    ///
    /// The submission maps each satisfied descriptor to the first credential selected for it.
    pub async fn create_presentation(
        &self,
        request: &RequestObject,
        selected: &[SelectedCredential],
    ) -> Result<PresentationResponse> {
        if selected.is_empty() {
            bail!("no credential satisfies the presentation definition")
        }

        let vp_token = ProofBuilder::new(&request.client_id, &request.nonce)
            .with_credentials(selected.iter().map(|s| s.credential.clone()).collect())
            .build(self.signer.as_ref())
            .await?;

        let mut first_match = BTreeMap::new();
        for (index, selection) in selected.iter().enumerate() {
            first_match
                .entry(selection.descriptor_id.as_str())
                .or_insert(index);
        }
        let descriptor_map = request
            .presentation_definition
            .input_descriptors()
            .iter()
            .filter_map(|descriptor| {
                first_match
                    .get(descriptor.id())
                    .map(|index| DescriptorMap::jwt_vp_credential(descriptor.id(), *index))
            })
            .collect::<Result<Vec<_>>>()?;

        let submission = PresentationSubmission::new(
            uuid::Uuid::new_v4().to_string(),
            request.presentation_definition.id().clone(),
            descriptor_map,
        );

        Ok(PresentationResponse {
            vp_token: Some(Value::String(vp_token)),
            presentation_submission: Some(
                serde_json::to_value(submission).context("failed to encode submission")?,
            ),
            state: Some(request.state.clone()),
        })
    }

    /// Run the pre-authorized code flow for `offer` and store the issued credential.
    ///
    /// Returns the hash of the stored credential.
    pub async fn receive_offer(
        &self,
        client: &WalletClient,
        offer: &str,
        user_pin: Option<&str>,
    ) -> Result<String> {
        let offer = client.fetch_offer(offer).await?;
        let grant = offer
            .pre_authorized_code_grant()
            .context("offer has no pre-authorized code grant")?;
        if grant.user_pin_required && user_pin.is_none() {
            bail!("offer requires a user PIN")
        }

        let metadata = client.issuer_metadata(&offer.credential_issuer).await?;
        let token = client
            .request_token(&metadata.token_endpoint, &grant.pre_authorized_code, user_pin)
            .await?;

        let request = self
            .credential_request(&metadata.credential_issuer, &token.c_nonce, None)
            .await?;
        let response = client
            .request_credential(&metadata.credential_endpoint, &token.access_token, &request)
            .await?;

        tracing::info!("received {} credential from {}", response.format, metadata.credential_issuer);
        self.store_credential(response.credential).await
    }

    /// Fetch the request behind `request_uri`, select credentials and submit a presentation.
    pub async fn respond_to_request(
        &self,
        client: &WalletClient,
        request_uri: &str,
    ) -> Result<SubmittedResponse> {
        let request = client.fetch_request(request_uri).await?;
        let selected = self.evaluate_request(&request.presentation_definition).await?;
        let response = self.create_presentation(&request, &selected).await?;
        client
            .submit_presentation(&request.redirect_uri, &response)
            .await
    }
}
