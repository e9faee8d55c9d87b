//! Request guards for the hub.
//!
//! Routes declare an explicit, ordered [`PolicyPipeline`] at registration
//! time; there is no annotation metadata and no runtime reflection. The
//! pipeline runs to completion before any handler logic executes - guards
//! are gating, never advisory - and stops at the first failing policy.
//!
//! - [`policy`]: pipeline types and evaluation
//! - [`bearer`]: end-user bearer token authentication
//! - [`site`]: site-to-site request signature authentication

pub mod bearer;
pub mod policy;
pub mod site;

pub use policy::{apply, BearerMode, PolicyPipeline, RequestAuth, RoutePolicy};
