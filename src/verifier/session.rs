use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The record of one answered presentation request. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationSession {
    pub session_id: String,
    pub request_id: String,
    pub verification_result: VerificationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PresentationSession {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            request_id: self.request_id.clone(),
            timestamp: self.timestamp,
            expires_at: self.expires_at,
            verification_result: ResultSummary {
                valid: self.verification_result.valid,
                credentials_count: self.verification_result.credentials.len(),
            },
        }
    }
}

/// Outcome of verifying a presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// No errors and every credential valid.
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
    pub credentials: Vec<CredentialResult>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialResult {
    pub valid: bool,
    pub issuer: Option<String>,
    pub subject: Option<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub credential: Value,
}

/// Returned by [Verifier::submit_response](super::Verifier::submit_response).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedResponse {
    pub session_id: String,
    pub verification_result: VerificationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verification_result: ResultSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub valid: bool,
    pub credentials_count: usize,
}
