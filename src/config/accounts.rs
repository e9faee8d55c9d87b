//! Boot-time account blocks.

use rangehub_trust::IdentityId;
use serde::Deserialize;

/// An `[[account]]` block.
///
/// Passwords are Argon2 PHC strings, never plaintext. The account list is a
/// boot loader for the in-memory directory, not a persistence layer.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountBlock {
    /// Directory id; becomes the token subject.
    pub id: IdentityId,
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Argon2 PHC hash of the login password.
    pub password: String,
    /// Unrestricted capability across all sites.
    #[serde(default)]
    pub global_admin: bool,
}
