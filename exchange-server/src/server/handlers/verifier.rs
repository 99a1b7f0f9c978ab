use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use credential_exchange::{
    core::{
        oid4vp::{CreateRequestParams, PresentationResponse, RequestObject},
        presentation_definition::DefinitionRequirements,
    },
    verifier::{request::CreatedRequest, session::SubmittedResponse},
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::server::{error::AppError, extract::JsonOrForm, AppState};

/// POST /presentation-request
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(params): Json<CreateRequestParams>,
) -> Result<Json<CreatedRequest>, AppError> {
    let created = state.verifier.create_request(params).await?;
    info!("Created presentation request {}", created.request_id);
    Ok(Json(created))
}

/// GET /request/:id
///
/// The wallet dereferences `request_uri` here.
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RequestObject>, AppError> {
    Ok(Json(state.verifier.retrieve_request(&id).await?))
}

/// POST /presentation-response
///
/// `direct_post` sends a form whose structured values are JSON strings. They are decoded
/// before the response is verified.
pub async fn submit_response(
    State(state): State<Arc<AppState>>,
    JsonOrForm(mut response): JsonOrForm<PresentationResponse>,
) -> Result<Json<SubmittedResponse>, AppError> {
    response.vp_token = response.vp_token.map(decode_form_json);
    response.presentation_submission = response.presentation_submission.map(decode_form_json);
    debug!("Received presentation response for state {:?}", response.state);

    Ok(Json(state.verifier.submit_response(response).await?))
}

/// GET /session/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let session = state.verifier.get_session(&id).await?;
    Ok(Json(json!({ "session": session })))
}

/// POST /create-presentation-definition
pub async fn create_presentation_definition(
    State(state): State<Arc<AppState>>,
    Json(requirements): Json<DefinitionRequirements>,
) -> Json<Value> {
    let definition = state.verifier.create_presentation_definition(&requirements);
    Json(json!({ "presentation_definition": definition }))
}

/// GET /requests
pub async fn list_requests(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let requests = state.verifier.list_requests().await?;
    Ok(Json(json!({ "count": requests.len(), "requests": requests })))
}

/// GET /sessions
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let sessions = state.verifier.list_sessions().await?;
    Ok(Json(json!({ "count": sessions.len(), "sessions": sessions })))
}

/// A JSON object or array carried as a string. Anything else, a compact JWT included, is
/// kept as is.
fn decode_form_json(value: Value) -> Value {
    if let Value::String(s) = &value {
        if s.trim_start().starts_with(['{', '[']) {
            if let Ok(decoded) = serde_json::from_str(s) {
                return decoded;
            }
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_values_are_decoded_when_structured() {
        assert_eq!(
            decode_form_json(Value::String(r#"{"id":"1"}"#.into())),
            json!({ "id": "1" })
        );
        assert_eq!(
            decode_form_json(Value::String("eyJ.eyJ.sig".into())),
            Value::String("eyJ.eyJ.sig".into())
        );
        assert_eq!(
            decode_form_json(Value::String("{not json".into())),
            Value::String("{not json".into())
        );
        assert_eq!(decode_form_json(json!({ "a": 1 })), json!({ "a": 1 }));
    }
}
