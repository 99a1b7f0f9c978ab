use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Protocol error returned by the issuer and verifier operations.
///
/// Every variant carries a stable, machine-readable `code` (e.g. `invalid_nonce`) that is
/// returned to the caller as the `error` member of an [ErrorResponse].
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed parameters, schema mismatch, unsupported grant or format.
    #[error("{code}{}", fmt_detail(.detail))]
    Validation {
        code: String,
        detail: Option<String>,
        errors: Vec<String>,
    },
    /// Invalid or expired token or proof, nonce or subject mismatch.
    #[error("{code}{}", fmt_detail(.detail))]
    Auth { code: String, detail: Option<String> },
    /// Absent or expired offer, request or session.
    #[error("{code}{}", fmt_detail(.detail))]
    NotFound { code: String, detail: Option<String> },
    /// Unexpected collaborator failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn fmt_detail(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

impl Error {
    pub fn validation(code: impl Into<String>) -> Self {
        Self::Validation {
            code: code.into(),
            detail: None,
            errors: Vec::new(),
        }
    }

    pub fn auth(code: impl Into<String>) -> Self {
        Self::Auth {
            code: code.into(),
            detail: None,
        }
    }

    pub fn not_found(code: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            detail: None,
        }
    }

    /// Attach a human readable description. Ignored for [Error::Internal].
    pub fn with_detail(mut self, message: impl Into<String>) -> Self {
        match &mut self {
            Self::Validation { detail, .. }
            | Self::Auth { detail, .. }
            | Self::NotFound { detail, .. } => *detail = Some(message.into()),
            Self::Internal(_) => {}
        }
        self
    }

    /// Attach a list of validator errors. Only meaningful for [Error::Validation].
    pub fn with_errors(mut self, list: Vec<String>) -> Self {
        if let Self::Validation { errors, .. } = &mut self {
            *errors = list;
        }
        self
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Validation { code, .. } | Self::Auth { code, .. } | Self::NotFound { code, .. } => {
                code
            }
            Self::Internal(_) => "server_error",
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Validation { detail, .. }
            | Self::Auth { detail, .. }
            | Self::NotFound { detail, .. } => detail.clone(),
            Self::Internal(e) => Some(format!("{e:#}")),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Auth { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let errors = match self {
            Self::Validation { errors, .. } => errors.clone(),
            _ => Vec::new(),
        };

        ErrorResponse {
            error: self.code().to_string(),
            detail: self.detail(),
            errors,
        }
    }
}

/// Wire representation of an [Error].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
