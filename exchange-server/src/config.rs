use std::path::PathBuf;

use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    /// Public URL of the server. Issuer metadata, offer links and presentation requests are
    /// built from it.
    pub public_url: Url,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// JSON file backing the schema registry. Schemas are kept in memory when unset.
    pub schema_file: Option<PathBuf>,

    /// `client_id` of the verifier's presentation requests, if not the library default.
    pub client_id: Option<String>,
}

impl Config {
    pub fn new(public_url: Url) -> Self {
        Self {
            public_url,
            port: 3000,
            host: "0.0.0.0".to_string(),
            schema_file: None,
            client_id: None,
        }
    }
}
