//! rangehubd - Range Hub global coordination daemon.
//!
//! The hub authenticates end users with bearer tokens, derives per-site
//! capabilities on every request, authenticates inbound site-to-site calls
//! with Ed25519 request signatures, and fans realtime events out to the live
//! set of connected viewers per channel.
//!
//! Built as a library so integration tests can run the daemon in-process;
//! the `rangehubd` binary is a thin wrapper around [`server::serve`].

pub mod config;
pub mod directory;
pub mod error;
pub mod guard;
pub mod http;
pub mod metrics;
pub mod realtime;
pub mod security;
pub mod server;
pub mod telemetry;
