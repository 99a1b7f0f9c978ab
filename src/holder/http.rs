use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method, Request, Response,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::core::error::ErrorResponse;

/// Generic HTTP client.
///
/// A trait is used so the wallet can run over any transport, including an in-process router in
/// tests.
#[async_trait]
pub trait AsyncHttpClient: Send + Sync {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

#[derive(Debug, Clone)]
pub struct ReqwestClient(reqwest::Client);

impl AsRef<reqwest::Client> for ReqwestClient {
    fn as_ref(&self) -> &reqwest::Client {
        &self.0
    }
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("unable to build http_client")
            .map(Self)
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let response = self
            .0
            .execute(request.try_into().context("unable to convert request")?)
            .await
            .context("http request failed")?;

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());

        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(response.headers().clone());

        builder
            .body(
                response
                    .bytes()
                    .await
                    .context("failed to extract response body")?
                    .to_vec(),
            )
            .context("unable to construct response")
    }
}

/// A request body and its content type.
pub(crate) enum Body<'a, T: Serialize + ?Sized> {
    Empty,
    Json(&'a T),
    Form(&'a T),
}

/// Send a request and decode the JSON response.
///
/// A non-success status fails with the server's `error` code when the body carries one.
pub(crate) async fn send<T, R>(
    client: &dyn AsyncHttpClient,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Body<'_, T>,
) -> Result<R>
where
    T: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let mut builder = Request::builder()
        .method(method.clone())
        .uri(uri)
        .header(ACCEPT, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    let bytes = match body {
        Body::Empty => Vec::new(),
        Body::Json(value) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            serde_json::to_vec(value).context("failed to encode JSON body")?
        }
        Body::Form(value) => {
            builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
            serde_urlencoded::to_string(value)
                .context("failed to encode form body")?
                .into_bytes()
        }
    };

    let request = builder
        .body(bytes)
        .with_context(|| format!("failed to construct request to {uri}"))?;
    let response = client
        .execute(request)
        .await
        .with_context(|| format!("{method} {uri} failed"))?;

    let status = response.status();
    let body = response.into_body();
    if !status.is_success() {
        match serde_json::from_slice::<ErrorResponse>(&body) {
            Ok(error) => bail!(
                "{method} {uri} was unsuccessful (status: {status}): {}",
                error.error
            ),
            Err(_) => bail!(
                "{method} {uri} was unsuccessful (status: {status}): {}",
                String::from_utf8_lossy(&body)
            ),
        }
    }

    serde_json::from_slice(&body).with_context(|| format!("unexpected response from {uri}"))
}
