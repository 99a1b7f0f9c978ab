use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use credential_exchange::core::error::Error;
use tracing::error;

/// A core [Error] rendered as `{error, detail?, errors?}` with its status code.
#[derive(Debug)]
pub struct AppError(pub Error);

impl AppError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self(Error::validation("invalid_request").with_detail(detail))
    }

    pub fn unauthorized(code: &str, detail: impl Into<String>) -> Self {
        Self(Error::auth(code).with_detail(detail))
    }
}

impl From<Error> for AppError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:#}", self.0);
        }

        (status, Json(self.0.to_response())).into_response()
    }
}
