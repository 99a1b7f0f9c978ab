use chrono::Utc;
use serde_json::{Map, Value};

use crate::core::{
    capability::IssuanceCapability,
    credential::Credential,
    did::{verify_jws, DidResolver},
    error::{Error, Result},
    jwt::{self, Claims},
    matching::unsatisfied_descriptors,
    presentation_submission::PresentationSubmission,
};

use super::{
    request::PresentationRequest,
    session::{CredentialResult, VerificationResult},
};

/// Verify a presentation answering `request`.
///
/// Only an undecodable `vp_token` is an error. Every other problem is recorded in the
/// result, which is then invalid.
pub(crate) async fn verify_presentation(
    request: &PresentationRequest,
    vp_token: &Value,
    submission: Option<&Value>,
    capability: &dyn IssuanceCapability,
    resolver: &dyn DidResolver,
) -> Result<VerificationResult> {
    let mut errors = Vec::new();

    let (holder, vp, payload) = match vp_token {
        Value::String(token) => {
            let claims: Claims = jwt::decode_payload(token).map_err(|e| {
                Error::validation("invalid_presentation").with_detail(format!("{e:#}"))
            })?;
            check_jwt_presentation(token, &claims, request, resolver, &mut errors).await;

            let vp = claims.extra.get("vp").cloned().unwrap_or_else(|| {
                errors.push("Presentation has no vp claim".to_string());
                Value::Object(Map::new())
            });
            let holder = claims.iss.clone();
            let payload = serde_json::to_value(&claims).map_err(anyhow::Error::from)?;
            (holder, vp, payload)
        }
        Value::Object(object) => {
            let challenge = object
                .get("proof")
                .and_then(|proof| proof.get("challenge"))
                .and_then(Value::as_str);
            if challenge != Some(request.nonce.as_str()) {
                errors.push("Nonce mismatch".to_string());
            }
            errors.push("Unsupported presentation proof: linked data proofs are not supported".to_string());

            let holder = object.get("holder").and_then(Value::as_str).map(String::from);
            (holder, vp_token.clone(), vp_token.clone())
        }
        _ => {
            return Err(Error::validation("invalid_presentation")
                .with_detail("vp_token must be a JWT or a presentation object"))
        }
    };

    let credentials = match vp.get("verifiableCredential") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single.clone()],
    };

    let mut results = Vec::with_capacity(credentials.len());
    let mut presented = Vec::new();
    for raw in credentials {
        let (result, json) =
            check_credential(Credential::from(raw), holder.as_deref(), capability).await;
        if let (true, Some(json)) = (result.valid, json) {
            presented.push(json);
        }
        results.push(result);
    }

    for descriptor in unsatisfied_descriptors(&presented, &request.presentation_definition) {
        errors.push(format!("Input descriptor {descriptor} is not satisfied"));
    }

    if let Some(raw) = submission {
        match PresentationSubmission::from_json(raw) {
            Ok(submission) => {
                errors.extend(submission.validate(&request.presentation_definition, &payload))
            }
            Err(e) => errors.push(e),
        }
    }

    let valid = errors.is_empty() && results.iter().all(|credential| credential.valid);
    tracing::debug!("presentation for request {} valid: {valid}", request.id);

    Ok(VerificationResult {
        valid,
        holder,
        credentials: results,
        errors,
    })
}

async fn check_jwt_presentation(
    token: &str,
    claims: &Claims,
    request: &PresentationRequest,
    resolver: &dyn DidResolver,
    errors: &mut Vec<String>,
) {
    match verify_jws(token, resolver).await {
        Ok(decoded) => {
            let kid_did = decoded
                .header
                .kid
                .as_deref()
                .filter(|kid| kid.starts_with("did:"))
                .and_then(|kid| kid.split('#').next());
            if kid_did.is_some_and(|did| Some(did) != claims.iss.as_deref()) {
                errors.push("Presentation key is not controlled by its issuer".to_string());
            }
        }
        Err(e) => errors.push(format!("Invalid presentation signature: {e:#}")),
    }

    if claims.nonce.as_deref() != Some(request.nonce.as_str()) {
        errors.push("Nonce mismatch".to_string());
    }

    if !claims
        .aud
        .as_ref()
        .is_some_and(|aud| aud.contains(&request.client_id))
    {
        errors.push(format!("Presentation audience is not {}", request.client_id));
    }

    if claims.is_expired(Utc::now().timestamp()) {
        errors.push("Presentation has expired".to_string());
    }

    let vp_holder = claims
        .extra
        .get("vp")
        .and_then(|vp| vp.get("holder"))
        .and_then(Value::as_str);
    if vp_holder.is_some_and(|holder| Some(holder) != claims.iss.as_deref()) {
        errors.push("Presentation holder does not match its issuer".to_string());
    }
}

/// Verify one embedded credential, returning its result and, when it decodes, its
/// normalized JSON.
async fn check_credential(
    credential: Credential,
    holder: Option<&str>,
    capability: &dyn IssuanceCapability,
) -> (CredentialResult, Option<Value>) {
    let check = capability.verify_credential(&credential).await;
    let subject = credential.subject_id();

    let (valid, error) = match (check.verified, check.error) {
        (false, error) => (false, error.or_else(|| Some("Credential is not valid".to_string()))),
        (true, _) if holder.is_some() && subject.as_deref() != holder => (
            false,
            Some("Credential subject does not match the presentation holder".to_string()),
        ),
        (true, _) => (true, None),
    };

    let result = CredentialResult {
        valid,
        issuer: credential.issuer(),
        subject,
        types: credential.types(),
        error,
        credential: credential.to_wire(),
    };
    (result, credential.to_json())
}
