use std::{fmt::Debug, sync::Arc};

use anyhow::{bail, Context, Result};
use http::Method;
use serde_json::Value;
use url::Url;

use crate::{
    core::{
        oid4vci::{
            CredentialOfferObject, CredentialRequest, CredentialResponse, IssuerMetadata,
            TokenRequest, TokenResponse, CREDENTIAL_OFFER_SCHEME, PRE_AUTHORIZED_CODE_GRANT,
        },
        oid4vp::{PresentationResponse, RequestObject, RequestUri},
    },
    verifier::session::SubmittedResponse,
};

use super::http::{send, AsyncHttpClient, Body};

/// The wallet side of the issuance and presentation endpoints.
#[derive(Clone)]
pub struct WalletClient {
    http: Arc<dyn AsyncHttpClient>,
}

impl Debug for WalletClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletClient").finish_non_exhaustive()
    }
}

impl WalletClient {
    pub fn new(http: Arc<dyn AsyncHttpClient>) -> Self {
        Self { http }
    }

    /// Dereference a credential offer, given as an `openid-credential-offer://` deep link or
    /// as the `credential_offer_uri` itself.
    pub async fn fetch_offer(&self, offer: &str) -> Result<CredentialOfferObject> {
        let uri = parse_offer_uri(offer)?;
        send(self.http.as_ref(), Method::GET, &uri, None, Body::<()>::Empty)
            .await
            .context("failed to fetch credential offer")
    }

    pub async fn issuer_metadata(&self, credential_issuer: &str) -> Result<IssuerMetadata> {
        let uri = format!(
            "{}/.well-known/openid-credential-issuer",
            credential_issuer.trim_end_matches('/')
        );
        send(self.http.as_ref(), Method::GET, &uri, None, Body::<()>::Empty).await
    }

    /// Redeem a pre-authorized code at the token endpoint.
    pub async fn request_token(
        &self,
        token_endpoint: &str,
        pre_authorized_code: &str,
        user_pin: Option<&str>,
    ) -> Result<TokenResponse> {
        let request = TokenRequest {
            grant_type: Some(PRE_AUTHORIZED_CODE_GRANT.to_string()),
            pre_authorized_code: Some(pre_authorized_code.to_string()),
            user_pin: user_pin.map(String::from),
        };
        send(self.http.as_ref(), Method::POST, token_endpoint, None, Body::Form(&request)).await
    }

    pub async fn request_credential(
        &self,
        credential_endpoint: &str,
        access_token: &str,
        request: &CredentialRequest,
    ) -> Result<CredentialResponse> {
        send(
            self.http.as_ref(),
            Method::POST,
            credential_endpoint,
            Some(access_token),
            Body::Json(request),
        )
        .await
    }

    /// Dereference a presentation request from its `openid4vp://` deep link or its URL.
    pub async fn fetch_request(&self, request_uri: &str) -> Result<RequestObject> {
        let RequestUri { request_uri, .. } = RequestUri::parse(request_uri)?;
        send(self.http.as_ref(), Method::GET, &request_uri, None, Body::<()>::Empty)
            .await
            .context("failed to fetch presentation request")
    }

    /// Post a presentation to the request's `redirect_uri`, form encoded as `direct_post`
    /// requires.
    pub async fn submit_presentation(
        &self,
        redirect_uri: &str,
        response: &PresentationResponse,
    ) -> Result<SubmittedResponse> {
        let mut form = Vec::new();
        if let Some(vp_token) = &response.vp_token {
            form.push(("vp_token", form_value(vp_token)));
        }
        if let Some(submission) = &response.presentation_submission {
            form.push(("presentation_submission", form_value(submission)));
        }
        if let Some(state) = &response.state {
            form.push(("state", state.clone()));
        }

        send(self.http.as_ref(), Method::POST, redirect_uri, None, Body::Form(&form)).await
    }
}

fn form_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The `credential_offer_uri` of an offer deep link. Plain `http(s)` URIs are returned as is.
pub fn parse_offer_uri(offer: &str) -> Result<String> {
    if let Some(query) = offer
        .strip_prefix(CREDENTIAL_OFFER_SCHEME)
        .map(|rest| rest.trim_start_matches('?'))
    {
        return serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .context("credential offer link is not a query string")?
            .into_iter()
            .find_map(|(key, value)| (key == "credential_offer_uri").then_some(value))
            .context("credential offer link has no credential_offer_uri");
    }

    let url = Url::parse(offer).context("credential offer is not a URL")?;
    match url.scheme() {
        "http" | "https" => Ok(url.into()),
        other => bail!("unsupported credential offer scheme: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_links_are_unwrapped() {
        let link = "openid-credential-offer://?credential_offer_uri=\
                    http%3A%2F%2Fissuer.test%2Fcredential-offer%3Foffer_id%3Dabc";
        assert_eq!(
            parse_offer_uri(link).unwrap(),
            "http://issuer.test/credential-offer?offer_id=abc"
        );
        assert_eq!(
            parse_offer_uri("http://issuer.test/credential-offer?offer_id=abc").unwrap(),
            "http://issuer.test/credential-offer?offer_id=abc"
        );
        assert!(parse_offer_uri("openid-credential-offer://?other=1").is_err());
        assert!(parse_offer_uri("mailto:someone").is_err());
    }

    #[test]
    fn structured_form_values_are_json_encoded() {
        assert_eq!(form_value(&Value::String("a.b.c".into())), "a.b.c");
        assert_eq!(form_value(&serde_json::json!({ "id": "1" })), r#"{"id":"1"}"#);
    }
}
