use chrono::{DateTime, Utc};

use crate::core::{
    did::{verify_jws, DidResolver},
    error::{Error, Result},
    jwt::Claims,
};

use super::token::Token;

/// Check a holder's proof of possession, returning the holder DID it binds.
///
/// Failures are reported with the code of the first check that fails, in this order: parse,
/// signature, audience, `iss`/`sub` agreement, challenge, requested subject, expiry.
pub(crate) async fn verify_proof(
    proof_jwt: &str,
    audience: &str,
    token: &Token,
    subject_id: &str,
    resolver: &dyn DidResolver,
    now: DateTime<Utc>,
) -> Result<String> {
    let decoded = verify_jws(proof_jwt, resolver).await.map_err(|e| {
        tracing::debug!("proof signature rejected: {e:#}");
        Error::auth("invalid_proof").with_detail(format!("{e:#}"))
    })?;
    let claims = decoded.claims;

    if !claims.aud.as_ref().is_some_and(|aud| aud.contains(audience)) {
        return Err(Error::auth("invalid_proof").with_detail(format!("aud must be {audience}")));
    }

    let holder = holder_did(&claims)?;

    // The signing key must belong to the DID the proof speaks for.
    if let Some(kid) = decoded.header.kid.as_deref().filter(|kid| kid.starts_with("did:")) {
        let key_did = kid.split('#').next().unwrap_or(kid);
        if key_did != holder {
            return Err(Error::auth("invalid_proof").with_detail("kid is not controlled by iss"));
        }
    }

    match (token.live_nonce(now), claims.nonce.as_deref()) {
        (Some(expected), Some(nonce)) if expected == nonce => {}
        (None, _) => {
            return Err(Error::auth("invalid_nonce").with_detail("c_nonce is expired or used"))
        }
        _ => return Err(Error::auth("invalid_nonce").with_detail("nonce does not match c_nonce")),
    }

    if holder != subject_id {
        return Err(Error::auth("subject_mismatch")
            .with_detail("proof subject differs from credential_subject.id"));
    }

    if claims.is_expired(now.timestamp()) {
        return Err(Error::auth("proof_expired"));
    }

    Ok(holder)
}

#[cfg(not(feature = "maximize_interoperability"))]
fn holder_did(claims: &Claims) -> Result<String> {
    match (&claims.iss, &claims.sub) {
        (Some(iss), Some(sub)) if iss == sub => Ok(iss.clone()),
        _ => Err(Error::auth("invalid_proof").with_detail("iss and sub must name the holder")),
    }
}

/// Some wallets leave `sub` out of their proofs.
#[cfg(feature = "maximize_interoperability")]
fn holder_did(claims: &Claims) -> Result<String> {
    match (&claims.iss, &claims.sub) {
        (Some(iss), Some(sub)) if iss == sub => Ok(iss.clone()),
        (Some(iss), None) => Ok(iss.clone()),
        _ => Err(Error::auth("invalid_proof").with_detail("iss and sub must name the holder")),
    }
}
