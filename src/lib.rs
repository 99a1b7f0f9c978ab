//! This library implements a credential exchange between an issuer, a holder and a verifier:
//! pre-authorized code issuance following [OID4VCI] and presentation following [OID4VP] with
//! [Presentation Exchange] definitions.
//!
//! [OID4VCI]: <https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0.html>
//! [OID4VP]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>
//! [Presentation Exchange]: <https://identity.foundation/presentation-exchange/spec/v2.0.0/>
//!
//! # Issuer Usage
//!
//! ```ignore
//! use credential_exchange::config::{BaseUrl, IssuerConfig};
//! use credential_exchange::core::{capability::LocalAgent, signer::KeyManager};
//! use credential_exchange::issuer::Issuer;
//!
//! let issuer = Issuer::builder()
//!     .with_config(IssuerConfig::new(BaseUrl::try_from("https://issuer.example.com")?))
//!     .with_capability(Arc::new(LocalAgent::new(KeyManager::new(), "issuer")))
//!     .build()?;
//!
//! // An administrator offers a credential of a registered schema.
//! let offer = issuer
//!     .create_offer(CreateOfferRequest {
//!         schema_id: Some("DemoCredential".into()),
//!         claims: Some(claims),
//!         user_pin: None,
//!     })
//!     .await?;
//!
//! // `offer.credential_offer` is the deep link handed to the wallet. The wallet then calls
//! // `exchange_token` and `issue_credential` through the HTTP endpoints.
//! ```
//!
//! # Verifier Usage
//!
//! ```ignore
//! use credential_exchange::verifier::Verifier;
//!
//! let verifier = Verifier::builder()
//!     .with_config(VerifierConfig::new(base_url))
//!     .with_capability(capability)
//!     .build()?;
//!
//! // Ask for any verifiable credential.
//! let created = verifier.create_request(CreateRequestParams::default()).await?;
//!
//! // Present `created.request_uri` to the wallet (e.g., as a QR code). The wallet answers at
//! // the request's `redirect_uri`:
//! let submitted = verifier.submit_response(presentation_response).await?;
//! let session = verifier.get_session(&submitted.session_id).await?;
//! ```
//!
//! Requests and sessions are kept in [`TtlStore`]s, which can be swapped for a shared store.
//!
//! # Holder Usage
//!
//! ```ignore
//! use credential_exchange::holder::{client::WalletClient, http::ReqwestClient, Holder};
//!
//! let holder = Holder::new(signer, credential_store);
//! let client = WalletClient::new(Arc::new(ReqwestClient::new()?));
//!
//! holder.receive_offer(&client, &offer_link, Some("1234")).await?;
//! let submitted = holder.respond_to_request(&client, &request_uri).await?;
//! ```
//!
//! [`TtlStore`]: crate::core::store::TtlStore

pub mod config;
pub mod core;
pub mod holder;
pub mod issuer;
pub mod utils;
pub mod verifier;
pub use serde_json_path::JsonPath;
