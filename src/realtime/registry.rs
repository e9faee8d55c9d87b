//! Live connection registry and broadcaster.
//!
//! The one piece of shared mutable state in the hub. Connect/disconnect
//! arrive concurrently from independent transport tasks; mutation is
//! serialized per channel behind a lock, and a broadcast operates on a
//! consistent snapshot taken before delivery starts. A connection is
//! `Connected` until its one terminal `Disconnected` transition; there are
//! no other states.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use rangehub_trust::SiteId;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identity of one live connection.
pub type ConnectionId = Uuid;

/// Queue depth per connection. A viewer that stops draining its socket
/// stalls only its own queue; broadcasts to it simply wait their turn.
const EVENT_QUEUE_DEPTH: usize = 64;

/// One realtime namespace per domain concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    /// Camera activity at a site.
    Camera,
    /// Payment activity at a site.
    Payment,
}

impl EventTopic {
    /// Canonical lowercase name, as used in URLs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Payment => "payment",
        }
    }

    /// Parse the canonical name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "camera" => Some(Self::Camera),
            "payment" => Some(Self::Payment),
            _ => None,
        }
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A topic scoped to one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventChannel {
    /// The site this channel belongs to.
    pub site: SiteId,
    /// The domain concern.
    pub topic: EventTopic,
}

impl fmt::Display for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.site, self.topic)
    }
}

/// An event as delivered to viewers.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Channel the event was broadcast on, e.g. `"7/camera"`.
    pub channel: String,
    /// Event name, e.g. `"added"`.
    pub event: String,
    /// Event payload as supplied by the originating site.
    pub payload: serde_json::Value,
    /// Hub-side timestamp (unix seconds).
    pub at: i64,
}

/// Registry-owned handle to one connection's delivery queue.
///
/// The registry owns the entry; the transport task owns the socket I/O.
/// `closed` flips exactly once, on disconnect, and a broadcast snapshot
/// checks it so a connection removed mid-iteration is skipped.
#[derive(Clone)]
struct ConnectionHandle {
    tx: mpsc::Sender<Arc<Event>>,
    closed: Arc<AtomicBool>,
}

type Members = HashMap<ConnectionId, ConnectionHandle>;

/// Owned registry of live connections per channel.
///
/// Constructed explicitly inside the application state; never a
/// module-level collection.
#[derive(Default)]
pub struct ConnectionRegistry {
    channels: DashMap<EventChannel, Arc<RwLock<Members>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a channel and hand back its event queue.
    ///
    /// Idempotent per connection identity: re-registering an id replaces
    /// the previous entry and force-closes it, so a channel never holds two
    /// live entries for one connection.
    pub fn connect(&self, channel: EventChannel, id: ConnectionId) -> mpsc::Receiver<Arc<Event>> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let handle = ConnectionHandle {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        };

        // Insert while the map entry is held, so a concurrent prune of the
        // channel cannot strand this membership in a detached set.
        let replaced = {
            let members = self.channels.entry(channel).or_default();
            members.write().insert(id, handle)
        };
        if let Some(prev) = replaced {
            prev.closed.store(true, Ordering::SeqCst);
        } else {
            crate::metrics::connection_opened(&channel.to_string());
        }
        tracing::debug!(channel = %channel, connection = %id, "connection joined");
        rx
    }

    /// Remove a connection from a channel.
    ///
    /// Removes by identity exactly once even if disconnect fires more than
    /// once; returns whether this call did the removal. Removal drops the
    /// registry's sender and marks the handle closed, which force-closes
    /// the transport task's event loop.
    pub fn disconnect(&self, channel: EventChannel, id: ConnectionId) -> bool {
        let removed = match self.channels.get(&channel) {
            Some(members) => members.write().remove(&id),
            None => return false,
        };
        match removed {
            Some(handle) => {
                handle.closed.store(true, Ordering::SeqCst);
                crate::metrics::connection_closed(&channel.to_string());
                tracing::debug!(channel = %channel, connection = %id, "connection left");
                // Drop empty channels so the map does not grow with every
                // channel ever seen.
                self.channels
                    .remove_if(&channel, |_, members| members.read().is_empty());
                true
            }
            None => false,
        }
    }

    /// Broadcast an event to the channel's current membership.
    ///
    /// Takes a snapshot of the membership before iterating; a connection
    /// that disconnects during iteration is skipped via its closed flag,
    /// and a dead queue never fails the broadcast. Returns the number of
    /// queues the event was delivered to.
    pub async fn broadcast(
        &self,
        channel: EventChannel,
        event: &str,
        payload: serde_json::Value,
    ) -> usize {
        let snapshot: Vec<ConnectionHandle> = match self.channels.get(&channel) {
            Some(members) => members.read().values().cloned().collect(),
            None => Vec::new(),
        };

        let event = Arc::new(Event {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
            at: chrono::Utc::now().timestamp(),
        });

        let mut delivered = 0;
        for handle in snapshot {
            if handle.closed.load(Ordering::SeqCst) {
                continue;
            }
            if handle.tx.send(Arc::clone(&event)).await.is_ok() {
                delivered += 1;
            }
        }

        crate::metrics::record_broadcast(channel.topic.as_str(), delivered);
        tracing::debug!(channel = %channel, event = %event.event, delivered, "broadcast");
        delivered
    }

    /// Current membership size of a channel.
    pub fn member_count(&self, channel: EventChannel) -> usize {
        self.channels
            .get(&channel)
            .map(|m| m.read().len())
            .unwrap_or(0)
    }
}
