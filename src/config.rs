use chrono::Duration;
use serde::Deserialize;
use url::Url;

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// The base url without its trailing slash.
    ///
    /// This is the value published as `credential_issuer` and expected in the `aud` claim of
    /// proofs addressed to this service.
    pub fn identifier(&self) -> String {
        self.0.as_str().trim_end_matches('/').to_string()
    }

    /// Join a relative path onto the base, returning it as a string.
    pub fn endpoint(&self, path: &str) -> String {
        self.0
            .join(path.trim_start_matches('/'))
            .map(String::from)
            .unwrap_or_else(|_| format!("{}/{}", self.identifier(), path))
    }
}

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        url.parse().map(Self)
    }
}

impl TryFrom<&str> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        Self::try_from(url.to_string())
    }
}

impl From<Url> for BaseUrl {
    fn from(url: Url) -> Self {
        // A `Url` always serializes to a parseable string.
        Self::try_from(String::from(url.clone())).unwrap_or(Self(url))
    }
}

/// Issuer-side settings.
#[derive(Deserialize, Debug, Clone)]
pub struct IssuerConfig {
    pub base: BaseUrl,
    /// Alias of the issuer identifier held by the issuance capability.
    #[serde(default = "defaults::issuer_alias")]
    pub issuer_alias: String,
    #[serde(default = "defaults::token_ttl_secs")]
    pub token_ttl_secs: i64,
    #[serde(default = "defaults::c_nonce_ttl_secs")]
    pub c_nonce_ttl_secs: i64,
    /// Offers older than this can no longer be exchanged for a token. `None` disables expiry.
    #[serde(default = "defaults::offer_ttl_secs")]
    pub offer_ttl_secs: Option<i64>,
}

impl IssuerConfig {
    pub fn new(base: BaseUrl) -> Self {
        Self {
            base,
            issuer_alias: defaults::issuer_alias(),
            token_ttl_secs: defaults::token_ttl_secs(),
            c_nonce_ttl_secs: defaults::c_nonce_ttl_secs(),
            offer_ttl_secs: defaults::offer_ttl_secs(),
        }
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::seconds(self.token_ttl_secs)
    }

    pub fn c_nonce_ttl(&self) -> Duration {
        Duration::seconds(self.c_nonce_ttl_secs)
    }

    pub fn offer_ttl(&self) -> Option<Duration> {
        self.offer_ttl_secs.map(Duration::seconds)
    }
}

/// Verifier-side settings.
#[derive(Deserialize, Debug, Clone)]
pub struct VerifierConfig {
    pub base: BaseUrl,
    /// Default `client_id` placed in presentation requests. Presentations must name it in `aud`.
    #[serde(default = "defaults::client_id")]
    pub client_id: String,
    #[serde(default = "defaults::request_ttl_secs")]
    pub request_ttl_secs: i64,
    #[serde(default = "defaults::session_ttl_secs")]
    pub session_ttl_secs: i64,
}

impl VerifierConfig {
    pub fn new(base: BaseUrl) -> Self {
        Self {
            base,
            client_id: defaults::client_id(),
            request_ttl_secs: defaults::request_ttl_secs(),
            session_ttl_secs: defaults::session_ttl_secs(),
        }
    }

    pub fn request_ttl(&self) -> Duration {
        Duration::seconds(self.request_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_secs)
    }
}

mod defaults {
    pub fn issuer_alias() -> String {
        "issuer".to_string()
    }

    pub fn token_ttl_secs() -> i64 {
        300
    }

    pub fn c_nonce_ttl_secs() -> i64 {
        600
    }

    pub fn offer_ttl_secs() -> Option<i64> {
        Some(7 * 24 * 60 * 60)
    }

    pub fn client_id() -> String {
        "verifier-demo".to_string()
    }

    pub fn request_ttl_secs() -> i64 {
        15 * 60
    }

    pub fn session_ttl_secs() -> i64 {
        60 * 60
    }
}
