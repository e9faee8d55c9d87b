//! Site-to-site request signature authentication.
//!
//! Inbound requests from site daemons carry two headers: `site-id` (decimal
//! integer) and `signature` (base64 Ed25519 signature over the canonical
//! payload). The guard recomputes the canonical payload from the claimed
//! site id, the request path, and the buffered body, then verifies it
//! against the site's registered public key. Only then is the site identity
//! attached to the request; downstream code must use that attachment and
//! never a client-supplied id.

use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rangehub_trust::{canonicalize, AuthError, RequestBody, Site, SiteId};

use crate::server::AppState;

/// Header carrying the claimed site id.
pub const SITE_ID_HEADER: &str = "site-id";
/// Header carrying the base64-encoded signature.
pub const SIGNATURE_HEADER: &str = "signature";

/// Read a header that must occur exactly once.
///
/// A duplicated header is a spoofing vector (different intermediaries may
/// read different occurrences), so more than one occurrence is rejected
/// outright rather than picking either value.
fn single_header<'h>(headers: &'h HeaderMap, name: &str) -> Result<&'h str, AuthError> {
    let mut occurrences = headers.get_all(name).iter();
    let first = occurrences.next().ok_or(AuthError::Missing)?;
    if occurrences.next().is_some() {
        return Err(AuthError::Invalid);
    }
    first.to_str().map_err(|_| AuthError::Invalid)
}

/// Parse the claimed site id: a positive decimal integer, nothing else.
fn parse_site_id(raw: &str) -> Result<SiteId, AuthError> {
    raw.parse::<SiteId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(AuthError::Invalid)
}

/// Classify the buffered body for canonicalization.
///
/// A body declared as JSON must parse; guessing a different representation
/// on parse failure would let signer and verifier disagree about what was
/// signed. Anything else is treated as an opaque byte payload.
fn classify_body(headers: &HeaderMap, body: &[u8]) -> Result<RequestBody, AuthError> {
    if body.is_empty() {
        return Ok(RequestBody::Empty);
    }
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if content_type.starts_with("application/json") || content_type.ends_with("+json") {
        let value = serde_json::from_slice(body).map_err(|_| AuthError::Invalid)?;
        return Ok(RequestBody::Json(value));
    }
    Ok(RequestBody::Raw(body.to_vec()))
}

/// Authenticate the calling site. Fail-closed on every path.
pub(crate) fn authenticate(
    state: &AppState,
    parts: &Parts,
    body: &[u8],
) -> Result<Site, AuthError> {
    let site_id = parse_site_id(single_header(&parts.headers, SITE_ID_HEADER)?)?;
    let signature_b64 = single_header(&parts.headers, SIGNATURE_HEADER)?;
    let signature = STANDARD
        .decode(signature_b64)
        .map_err(|_| AuthError::Invalid)?;

    let Some(site) = state.sites.lookup(site_id) else {
        crate::metrics::record_signature_check(false);
        return Err(AuthError::SiteUnknown);
    };

    let payload = canonicalize(site_id, parts.uri.path(), &classify_body(&parts.headers, body)?);
    if !site.public_key.verify(&payload, &signature) {
        crate::metrics::record_signature_check(false);
        tracing::debug!(site_id, path = %parts.uri.path(), "site signature rejected");
        return Err(AuthError::Invalid);
    }

    crate::metrics::record_signature_check(true);
    tracing::debug!(site_id, path = %parts.uri.path(), "site signature accepted");
    Ok(site)
}
