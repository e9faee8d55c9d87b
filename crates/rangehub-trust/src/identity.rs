//! Identity and site types.

use serde::Serialize;

use crate::signature::SitePublicKey;

/// Unique identity identifier (positive on the wire).
pub type IdentityId = i64;

/// Unique site identifier (positive on the wire).
pub type SiteId = i64;

/// An authenticated end user.
///
/// Loaded fresh from the directory for every request using the token's
/// subject id, and immutable for the lifetime of that request. Never cache
/// an `Identity` across requests: role changes must be visible immediately.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    /// Directory id, the token subject.
    pub id: IdentityId,
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Unrestricted capability across all sites.
    pub is_global_admin: bool,
}

/// An independently deployed site, trusted via its registered public key.
///
/// Registered out-of-band; the public key is consumed read-only for
/// signature verification. The role lists are the live relationship data
/// that [`crate::capability::resolve`] reads on every call.
#[derive(Debug, Clone)]
pub struct Site {
    /// Site identifier, matched against the `site-id` request header.
    pub id: SiteId,
    /// Ed25519 verification key registered for this site.
    pub public_key: SitePublicKey,
    /// Identities holding the owner role at this site.
    pub owner_ids: Vec<IdentityId>,
    /// Identities holding the security guard role at this site.
    pub security_guard_ids: Vec<IdentityId>,
}
