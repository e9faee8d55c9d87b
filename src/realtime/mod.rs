//! Realtime event distribution.
//!
//! The transport's own multicast is not reliable across this deployment's
//! topology, so the hub keeps an explicit, authoritative membership list per
//! channel and fans events out itself.
//!
//! - [`registry`]: live connection membership and broadcast
//! - [`gateway`]: WebSocket endpoint joining viewers to channels

pub mod gateway;
pub mod registry;

pub use registry::{ConnectionRegistry, Event, EventChannel, EventTopic};
