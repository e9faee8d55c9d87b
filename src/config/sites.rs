//! Registered site blocks.

use rangehub_trust::{IdentityId, Site, SiteId, SitePublicKey};
use serde::Deserialize;

use super::types::ConfigError;

/// A `[[site]]` block describing a trusted peer installation.
///
/// Keys are provisioned out-of-band; the hub only ever reads them for
/// signature verification.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteBlock {
    /// Site identifier, matched against the `site-id` request header.
    pub id: SiteId,
    /// Display name, informational only.
    #[serde(default)]
    pub name: String,
    /// Base64-encoded Ed25519 public key.
    pub public_key: String,
    /// Identities holding the owner role.
    #[serde(default)]
    pub owners: Vec<IdentityId>,
    /// Identities holding the security guard role.
    #[serde(default)]
    pub security_guards: Vec<IdentityId>,
}

impl SiteBlock {
    /// Decode into the directory's `Site` record.
    pub fn to_site(&self) -> Result<Site, ConfigError> {
        let public_key = SitePublicKey::from_base64(&self.public_key).map_err(|_| {
            ConfigError::Invalid(format!("site {} has an undecodable public key", self.id))
        })?;
        Ok(Site {
            id: self.id,
            public_key,
            owner_ids: self.owners.clone(),
            security_guard_ids: self.security_guards.clone(),
        })
    }
}
