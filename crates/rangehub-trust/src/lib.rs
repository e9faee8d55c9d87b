//! # rangehub-trust
//!
//! Trust primitives shared between the Range Hub and its site daemons:
//!
//! - Bearer token issue/verify with a fixed 30-day lifetime ([`token`])
//! - Per-site capability resolution ([`capability`])
//! - Canonical request payloads and Ed25519 site signatures ([`signature`])
//!
//! Everything in this crate is pure and stateless: no I/O, no clocks hidden
//! behind the API (verification takes an explicit instant where it matters),
//! and no caching. Capability sets in particular are recomputed from the
//! current relationship data on every call, so revoking a role takes effect
//! on the next request without invalidating outstanding tokens.
//!
//! Key material is supplied by the caller and consumed read-only; this crate
//! does not provision, store, or rotate keys.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod capability;
pub mod error;
pub mod identity;
pub mod signature;
pub mod token;

pub use capability::{resolve, CapabilitySet, SiteRole};
pub use error::{AuthError, KeyError};
pub use identity::{Identity, IdentityId, Site, SiteId};
pub use signature::{canonicalize, RequestBody, SiteKeyPair, SitePublicKey};
pub use token::{TokenAuthenticator, TokenSecret, TOKEN_LIFETIME_DAYS};
