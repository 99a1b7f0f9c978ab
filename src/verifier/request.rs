use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{oid4vp::RequestObject, presentation_definition::PresentationDefinition};

/// A presentation request held by the verifier until it is answered or expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationRequest {
    pub id: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub response_mode: String,
    pub presentation_definition: PresentationDefinition,
    pub nonce: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PresentationRequest {
    /// The request as a wallet sees it.
    pub fn to_request_object(&self) -> RequestObject {
        RequestObject {
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            response_type: self.response_type.clone(),
            response_mode: self.response_mode.clone(),
            presentation_definition: self.presentation_definition.clone(),
            nonce: self.nonce.clone(),
            state: self.state.clone(),
        }
    }

    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            id: self.id.clone(),
            client_id: self.client_id.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            presentation_definition: self.presentation_definition.clone(),
        }
    }
}

/// Returned by [Verifier::create_request](super::Verifier::create_request).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedRequest {
    pub request_id: String,
    /// `openid4vp://` deep link, usually rendered as a QR code.
    pub request_uri: String,
    /// Where the wallet fetches the request object.
    pub direct_request_url: String,
    pub presentation_request: RequestObject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: String,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub presentation_definition: PresentationDefinition,
}
