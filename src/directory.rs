//! In-memory account and site directories.
//!
//! Provisioning is out-of-band: config blocks load the directories at boot,
//! and the mutation methods exist so an operator surface (or a test) can
//! change relationship data at runtime. Lookups always read the current
//! entry - an [`Identity`] is materialized fresh per request and capability
//! resolution sees role changes on the very next call.

use dashmap::DashMap;
use rangehub_trust::{Identity, IdentityId, Site, SiteId};

use crate::config::{AccountBlock, ConfigError, SiteBlock};
use crate::security::password::verify_password;

/// A stored account. The password hash never leaves this record.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: IdentityId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub global_admin: bool,
}

impl AccountRecord {
    fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            is_global_admin: self.global_admin,
        }
    }
}

/// All known accounts, indexed by id with a username side-index for login.
#[derive(Debug, Default)]
pub struct AccountDirectory {
    accounts: DashMap<IdentityId, AccountRecord>,
    by_username: DashMap<String, IdentityId>,
}

impl AccountDirectory {
    /// Build from config blocks.
    pub fn from_blocks(blocks: &[AccountBlock]) -> Self {
        let dir = Self::default();
        for block in blocks {
            dir.insert(AccountRecord {
                id: block.id,
                username: block.username.clone(),
                email: block.email.clone(),
                password_hash: block.password.clone(),
                global_admin: block.global_admin,
            });
        }
        dir
    }

    /// Insert or replace an account.
    pub fn insert(&self, record: AccountRecord) {
        self.by_username.insert(record.username.clone(), record.id);
        self.accounts.insert(record.id, record);
    }

    /// Materialize a fresh identity for a token subject.
    ///
    /// Called once per request; the result must not be cached across
    /// requests.
    pub fn identity(&self, id: IdentityId) -> Option<Identity> {
        self.accounts.get(&id).map(|r| r.identity())
    }

    /// Verify login credentials and return the matching identity.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<Identity> {
        let id = *self.by_username.get(username)?;
        let record = self.accounts.get(&id)?;
        if verify_password(password, &record.password_hash) {
            Some(record.identity())
        } else {
            None
        }
    }

    /// Number of known accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// True when no accounts are loaded.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// All registered sites, indexed by id.
#[derive(Debug, Default)]
pub struct SiteDirectory {
    sites: DashMap<SiteId, Site>,
}

impl SiteDirectory {
    /// Build from config blocks, decoding each registered public key.
    pub fn from_blocks(blocks: &[SiteBlock]) -> Result<Self, ConfigError> {
        let dir = Self::default();
        for block in blocks {
            dir.upsert(block.to_site()?);
        }
        Ok(dir)
    }

    /// Register or replace a site.
    pub fn upsert(&self, site: Site) {
        self.sites.insert(site.id, site);
    }

    /// Remove a site registration.
    pub fn remove(&self, id: SiteId) -> bool {
        self.sites.remove(&id).is_some()
    }

    /// Current record for a site, cloned so callers see a consistent view
    /// of the role lists for the duration of one request.
    pub fn lookup(&self, id: SiteId) -> Option<Site> {
        self.sites.get(&id).map(|s| s.value().clone())
    }

    /// Grant the owner role. Idempotent.
    pub fn grant_owner(&self, site_id: SiteId, identity_id: IdentityId) -> bool {
        self.with_site(site_id, |site| {
            if !site.owner_ids.contains(&identity_id) {
                site.owner_ids.push(identity_id);
            }
        })
    }

    /// Revoke the owner role. Effective on the next request.
    pub fn revoke_owner(&self, site_id: SiteId, identity_id: IdentityId) -> bool {
        self.with_site(site_id, |site| site.owner_ids.retain(|id| *id != identity_id))
    }

    /// Grant the security guard role. Idempotent.
    pub fn grant_security_guard(&self, site_id: SiteId, identity_id: IdentityId) -> bool {
        self.with_site(site_id, |site| {
            if !site.security_guard_ids.contains(&identity_id) {
                site.security_guard_ids.push(identity_id);
            }
        })
    }

    /// Revoke the security guard role. Effective on the next request.
    pub fn revoke_security_guard(&self, site_id: SiteId, identity_id: IdentityId) -> bool {
        self.with_site(site_id, |site| {
            site.security_guard_ids.retain(|id| *id != identity_id)
        })
    }

    /// Number of registered sites.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// True when no sites are registered.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    fn with_site(&self, site_id: SiteId, f: impl FnOnce(&mut Site)) -> bool {
        match self.sites.get_mut(&site_id) {
            Some(mut site) => {
                f(site.value_mut());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::password::hash_password;
    use rangehub_trust::{resolve, SitePublicKey};

    fn account(id: IdentityId, username: &str, password: &str) -> AccountRecord {
        AccountRecord {
            id,
            username: username.to_string(),
            email: format!("{username}@example.net"),
            password_hash: hash_password(password).unwrap(),
            global_admin: false,
        }
    }

    fn site(id: SiteId, owners: &[IdentityId]) -> Site {
        Site {
            id,
            public_key: SitePublicKey::from_bytes(vec![0u8; 32]).unwrap(),
            owner_ids: owners.to_vec(),
            security_guard_ids: Vec::new(),
        }
    }

    #[test]
    fn authenticate_checks_password() {
        let dir = AccountDirectory::default();
        dir.insert(account(1, "alice", "pw"));
        assert_eq!(dir.authenticate("alice", "pw").map(|i| i.id), Some(1));
        assert!(dir.authenticate("alice", "wrong").is_none());
        assert!(dir.authenticate("nobody", "pw").is_none());
    }

    #[test]
    fn identity_reflects_current_record() {
        let dir = AccountDirectory::default();
        dir.insert(account(1, "alice", "pw"));
        assert!(!dir.identity(1).unwrap().is_global_admin);

        let mut promoted = account(1, "alice", "pw");
        promoted.global_admin = true;
        dir.insert(promoted);
        // Fresh load per request sees the promotion immediately.
        assert!(dir.identity(1).unwrap().is_global_admin);
    }

    #[test]
    fn revocation_is_visible_on_next_resolve() {
        let dir = SiteDirectory::default();
        dir.upsert(site(7, &[2]));

        let identity = Identity {
            id: 2,
            username: "bob".into(),
            email: "bob@example.net".into(),
            is_global_admin: false,
        };

        let before = resolve(&identity, &dir.lookup(7).unwrap());
        assert!(before.has_owner_or_higher());

        assert!(dir.revoke_owner(7, 2));
        let after = resolve(&identity, &dir.lookup(7).unwrap());
        assert!(after.is_empty());
    }

    #[test]
    fn role_mutation_on_unknown_site_is_a_noop() {
        let dir = SiteDirectory::default();
        assert!(!dir.grant_owner(99, 1));
        assert!(!dir.revoke_security_guard(99, 1));
    }
}
