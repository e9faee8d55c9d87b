//! End-user bearer token authentication.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use rangehub_trust::{AuthError, Identity};

use crate::guard::policy::BearerMode;
use crate::server::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticate the end user from the `Authorization` header.
///
/// Returns `Ok(None)` only in [`BearerMode::Optional`] with no header at
/// all. The identity is loaded fresh from the directory on every call; a
/// token whose subject no longer exists fails verification.
pub(crate) fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    mode: BearerMode,
) -> Result<Option<Identity>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return match mode {
            BearerMode::Optional => Ok(None),
            BearerMode::Required => Err(AuthError::Missing),
        };
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .ok_or(AuthError::Invalid)?;

    let identity_id = state.tokens.verify(token)?;
    let identity = state.accounts.identity(identity_id).ok_or_else(|| {
        tracing::debug!(identity_id, "token subject no longer in directory");
        AuthError::Invalid
    })?;
    Ok(Some(identity))
}
