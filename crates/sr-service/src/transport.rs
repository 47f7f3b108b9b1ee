//! Transport capability layer.
//!
//! The router never touches WebSocket internals. It sees the transport
//! through the [`GroupSender`] capability: targeted send, broadcast-group
//! membership, and group fan-out. [`ChannelTransport`] is the production
//! implementation backing every live connection with an unbounded channel
//! drained by that connection's writer task; tests drive the router
//! through the same type with probe channels instead of sockets.
//!
//! Delivery is best-effort at-most-once: a send to a connection whose
//! channel is gone (or was never registered) is swallowed. The relay does
//! not validate targets.

use crate::protocol::ServerEvent;

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Sender half of a connection's outbound channel.
pub type ConnectionSender = mpsc::UnboundedSender<ServerEvent>;

/// Capability interface the router uses to reach connections.
pub trait GroupSender: Send + Sync + 'static {
    /// Best-effort delivery to one connection.
    fn send(&self, connection_id: &str, event: ServerEvent);

    /// Add a connection to a named broadcast group.
    fn join_group(&self, connection_id: &str, group: &str);

    /// Remove a connection from a named broadcast group.
    fn leave_group(&self, connection_id: &str, group: &str);

    /// Deliver an event to every connection currently in the group,
    /// including the sender if present.
    fn broadcast(&self, group: &str, event: ServerEvent);
}

#[derive(Debug, Default)]
struct TransportState {
    /// Live connections by id (the connection registry).
    senders: HashMap<String, ConnectionSender>,
    /// Broadcast group membership, keyed by room id.
    groups: HashMap<String, HashSet<String>>,
}

/// Channel-backed transport: connection registry plus group membership.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    state: Mutex<TransportState>,
}

impl ChannelTransport {
    /// Create an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TransportState> {
        // A poisoned registry is still structurally sound; keep serving.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection's outbound channel. Called by the WebSocket
    /// layer at accept time.
    pub fn register(&self, connection_id: impl Into<String>, sender: ConnectionSender) {
        self.lock().senders.insert(connection_id.into(), sender);
    }

    /// Drop a connection from the registry and from every group it joined.
    ///
    /// Mirrors socket.io's auto-leave on disconnect: group membership does
    /// not outlive the connection.
    pub fn unregister(&self, connection_id: &str) {
        let mut state = self.lock();
        state.senders.remove(connection_id);
        state.groups.retain(|_, members| {
            members.remove(connection_id);
            !members.is_empty()
        });
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.lock().senders.len()
    }
}

impl GroupSender for ChannelTransport {
    fn send(&self, connection_id: &str, event: ServerEvent) {
        let state = self.lock();
        let Some(sender) = state.senders.get(connection_id) else {
            // Unknown or since-vanished target: best-effort contract says drop.
            debug!(
                target: "sr.transport",
                connection_id = %connection_id,
                "Dropping event for unknown connection"
            );
            return;
        };
        if sender.send(event).is_err() {
            debug!(
                target: "sr.transport",
                connection_id = %connection_id,
                "Dropping event for closed connection"
            );
        }
    }

    fn join_group(&self, connection_id: &str, group: &str) {
        self.lock()
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    fn leave_group(&self, connection_id: &str, group: &str) {
        let mut state = self.lock();
        if let Some(members) = state.groups.get_mut(group) {
            members.remove(connection_id);
            if members.is_empty() {
                state.groups.remove(group);
            }
        }
    }

    fn broadcast(&self, group: &str, event: ServerEvent) {
        let state = self.lock();
        let Some(members) = state.groups.get(group) else {
            return;
        };
        for member in members {
            if let Some(sender) = state.senders.get(member) {
                // Mid-broadcast disconnects are fine; the send just fails.
                let _ = sender.send(event.clone());
            }
        }
    }
}
