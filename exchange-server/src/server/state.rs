use std::sync::Arc;

use anyhow::{Context, Result};
use credential_exchange::{
    config::{BaseUrl, IssuerConfig, VerifierConfig},
    core::{
        capability::{IssuanceCapability, LocalAgent},
        signer::KeyManager,
    },
    issuer::{
        schema::{FileSchemaStore, MemorySchemaStore, SchemaStore},
        Issuer,
    },
    verifier::Verifier,
};
use tracing::info;

use crate::config::Config;

pub struct AppState {
    pub issuer: Issuer,
    pub verifier: Verifier,
    pub config: Config,
}

impl AppState {
    /// Wire an issuer and a verifier sharing one local signing agent.
    pub fn new(config: Config) -> Result<Self> {
        let base = BaseUrl::from(config.public_url.clone());
        let capability: Arc<dyn IssuanceCapability> =
            Arc::new(LocalAgent::new(KeyManager::new(), "issuer"));

        let issuer_config = IssuerConfig::new(base.clone());
        let schemas: Arc<dyn SchemaStore> = match &config.schema_file {
            Some(path) => {
                info!("Loading schemas from {}", path.display());
                Arc::new(FileSchemaStore::new(path.clone()))
            }
            None => Arc::new(MemorySchemaStore::new()),
        };

        let issuer = Issuer::builder()
            .with_config(issuer_config)
            .with_capability(capability.clone())
            .with_schema_store(schemas)
            .build()
            .context("failed to build issuer")?;

        let mut verifier_config = VerifierConfig::new(base);
        if let Some(client_id) = &config.client_id {
            verifier_config.client_id = client_id.clone();
        }
        let verifier = Verifier::builder()
            .with_config(verifier_config)
            .with_capability(capability)
            .build()
            .context("failed to build verifier")?;

        Ok(Self {
            issuer,
            verifier,
            config,
        })
    }
}
