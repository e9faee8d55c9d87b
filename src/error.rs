//! Guard failure handling for the hub.
//!
//! Every rejection - missing credential, bad token, unknown site, failed
//! signature, insufficient capability - leaves the process as the same
//! `401 {"error":"unauthenticated"}` response, so a caller cannot probe
//! which check failed. The specific reason is kept server-side: a tracing
//! event and a labelled metric.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rangehub_trust::AuthError;
use thiserror::Error;

/// A request was stopped by the guard pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Authentication failed (see [`AuthError`] for the taxonomy).
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Authenticated, but the resolved capability set does not satisfy the
    /// route's requirement.
    #[error("capability denied: requires {required}")]
    Denied {
        /// The capability the route demanded.
        required: &'static str,
    },
}

impl GuardError {
    /// Static error code for metrics labelling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.error_code(),
            Self::Denied { .. } => "denied",
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        tracing::debug!(code = self.error_code(), detail = %self, "request rejected");
        crate::metrics::record_auth_failure(self.error_code());

        // Uniform body on every path; reasons stay server-side.
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "unauthenticated" })),
        )
            .into_response()
    }
}
