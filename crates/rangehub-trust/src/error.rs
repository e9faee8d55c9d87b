//! Authentication failure taxonomy.
//!
//! Four variants cover every way a credential can fail. On the wire all of
//! them collapse into one indistinguishable "unauthenticated" response; the
//! variant survives only in server-side diagnostics and metric labels.

use thiserror::Error;

/// Why a credential was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential was presented at all.
    #[error("no credential presented")]
    Missing,

    /// A credential was presented but failed verification.
    #[error("credential failed verification")]
    Invalid,

    /// The token is past its fixed lifetime.
    #[error("token expired")]
    Expired,

    /// The signature was structurally valid but no registered site matches
    /// the claimed id.
    #[error("unknown site")]
    SiteUnknown,
}

impl AuthError {
    /// Static code for metric labelling and log correlation.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Invalid => "invalid",
            Self::Expired => "expired",
            Self::SiteUnknown => "site_unknown",
        }
    }
}

/// Supplied key material could not be parsed.
///
/// Deliberately carries no detail: key bytes never appear in errors or logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid key material")]
pub struct KeyError;
