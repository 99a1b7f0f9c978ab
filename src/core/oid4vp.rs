//! OpenID for Verifiable Presentations wire types.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::presentation_definition::PresentationDefinition;

pub const OPENID4VP_SCHEME: &str = "openid4vp";
pub const DIRECT_POST: &str = "direct_post";
pub const VP_TOKEN: &str = "vp_token";

/// `POST /presentation-request`. Every member is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRequestParams {
    #[serde(default)]
    pub presentation_definition: Option<PresentationDefinition>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub response_mode: Option<String>,
    #[serde(default)]
    pub response_type: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// The request as dereferenced by a wallet from `GET /request/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestObject {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub response_mode: String,
    pub presentation_definition: PresentationDefinition,
    pub nonce: String,
    pub state: String,
}

/// `POST /presentation-response`, JSON or form encoded.
///
/// `vp_token` is a compact JWT VP or a JSON-LD VP object; `presentation_submission` is an
/// object or, in form bodies, its JSON string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationResponse {
    #[serde(default)]
    pub vp_token: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<Value>,
    #[serde(default)]
    pub state: Option<String>,
}

/// The `openid4vp://` deep link carried in a QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestUri {
    pub client_id: String,
    pub request_uri: String,
}

impl RequestUri {
    pub fn to_deep_link(&self) -> Result<String> {
        let query = serde_urlencoded::to_string(self).context("failed to encode request uri")?;
        Ok(format!("{OPENID4VP_SCHEME}://?{query}"))
    }

    /// Parse a deep link. A plain `http(s)` URL is taken as the request URI itself.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).context("request uri is not a URL")?;

        match url.scheme() {
            OPENID4VP_SCHEME => {
                let query = url.query().unwrap_or_default();
                serde_urlencoded::from_str(query).context("request uri is missing parameters")
            }
            "http" | "https" => Ok(Self {
                client_id: String::new(),
                request_uri: uri.to_string(),
            }),
            other => bail!("unsupported request uri scheme: {other}"),
        }
    }
}
