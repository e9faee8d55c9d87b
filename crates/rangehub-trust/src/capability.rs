//! Per-site capability resolution.
//!
//! A [`CapabilitySet`] is a pure function of `(identity, site)` at the moment
//! of evaluation. It is never stored on the identity, never embedded in a
//! token, and never cached between requests, which is what makes role
//! revocation effective immediately.

use serde::Serialize;

use crate::identity::{Identity, Site};

/// The minimum site-scoped role a route can demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteRole {
    /// Owner or higher.
    Owner,
    /// Security guard or higher.
    SecurityGuard,
}

impl SiteRole {
    /// Human-readable name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::SecurityGuard => "sg",
        }
    }
}

/// The capabilities resolved for an (identity, site) pair.
///
/// Members mirror the enumerated capability values: `all` (global), `owner`
/// and `sg` (site-scoped). An empty set is the "none" outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    /// Unrestricted capability across all sites.
    pub all: bool,
    /// Owner capability at the evaluated site.
    pub owner: bool,
    /// Security guard capability at the evaluated site.
    pub sg: bool,
}

impl CapabilitySet {
    /// The empty ("none") set.
    pub const NONE: Self = Self { all: false, owner: false, sg: false };

    /// Check whether this set satisfies a minimum role requirement.
    pub fn grants(&self, role: SiteRole) -> bool {
        match role {
            SiteRole::Owner => self.has_owner_or_higher(),
            SiteRole::SecurityGuard => self.has_guard_or_higher(),
        }
    }

    /// Owner capability or above.
    pub fn has_owner_or_higher(&self) -> bool {
        self.all || self.owner
    }

    /// Security guard capability or above.
    pub fn has_guard_or_higher(&self) -> bool {
        self.all || self.owner || self.sg
    }

    /// True for the "none" outcome.
    pub fn is_empty(&self) -> bool {
        !self.all && !self.owner && !self.sg
    }
}

/// Derive the capability set for an identity at a site.
///
/// Precedence is evaluated in this exact order, short-circuiting at the
/// first match:
///
/// 1. global admin → `{all, owner, sg}`
/// 2. member of `owner_ids` → `{owner, sg}`
/// 3. member of `security_guard_ids` → `{sg}`
/// 4. otherwise → `{}`
///
/// Reads the site's current role lists on every call; callers must pass the
/// live `Site` record, not a snapshot from an earlier request.
pub fn resolve(identity: &Identity, site: &Site) -> CapabilitySet {
    if identity.is_global_admin {
        return CapabilitySet { all: true, owner: true, sg: true };
    }
    if site.owner_ids.contains(&identity.id) {
        return CapabilitySet { all: false, owner: true, sg: true };
    }
    if site.security_guard_ids.contains(&identity.id) {
        return CapabilitySet { all: false, owner: false, sg: true };
    }
    CapabilitySet::NONE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SitePublicKey;

    fn identity(id: i64, admin: bool) -> Identity {
        Identity {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.net"),
            is_global_admin: admin,
        }
    }

    fn site(owners: &[i64], guards: &[i64]) -> Site {
        Site {
            id: 7,
            public_key: SitePublicKey::from_bytes(vec![0u8; 32]).expect("32-byte key"),
            owner_ids: owners.to_vec(),
            security_guard_ids: guards.to_vec(),
        }
    }

    #[test]
    fn global_admin_gets_everything_without_membership() {
        let caps = resolve(&identity(1, true), &site(&[], &[]));
        assert_eq!(caps, CapabilitySet { all: true, owner: true, sg: true });
    }

    #[test]
    fn owner_gets_owner_and_guard() {
        let caps = resolve(&identity(2, false), &site(&[2], &[]));
        assert_eq!(caps, CapabilitySet { all: false, owner: true, sg: true });
    }

    #[test]
    fn guard_gets_guard_only() {
        let caps = resolve(&identity(3, false), &site(&[2], &[3]));
        assert_eq!(caps, CapabilitySet { all: false, owner: false, sg: true });
    }

    #[test]
    fn stranger_gets_none() {
        let caps = resolve(&identity(4, false), &site(&[2], &[3]));
        assert!(caps.is_empty());
        assert!(!caps.grants(SiteRole::SecurityGuard));
    }

    #[test]
    fn admin_precedence_beats_explicit_membership() {
        // Listed only as guard, but global admin wins first.
        let caps = resolve(&identity(5, true), &site(&[], &[5]));
        assert!(caps.all && caps.owner && caps.sg);
    }

    #[test]
    fn grants_follows_role_ladder() {
        let owner = resolve(&identity(2, false), &site(&[2], &[]));
        assert!(owner.grants(SiteRole::Owner));
        assert!(owner.grants(SiteRole::SecurityGuard));

        let guard = resolve(&identity(3, false), &site(&[], &[3]));
        assert!(!guard.grants(SiteRole::Owner));
        assert!(guard.grants(SiteRole::SecurityGuard));
    }
}
