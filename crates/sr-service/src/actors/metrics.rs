//! Router metrics and mailbox monitoring.
//!
//! Prometheus metrics carry the `sr_` prefix:
//!
//! - `sr_rooms_active` (gauge)
//! - `sr_connections_active` (gauge)
//! - `sr_messages_relayed_total` (counter)
//! - `sr_router_mailbox_depth` (gauge)

use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Mailbox depth above which processing is considered to be falling behind.
pub const ROUTER_MAILBOX_WARNING: usize = 500;

/// Mailbox monitor for the router's queue depth.
#[derive(Debug, Default)]
pub struct MailboxMonitor {
    /// Current mailbox depth.
    depth: AtomicUsize,
    /// Total messages processed.
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    /// Create a new monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message being added to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        #[allow(clippy::cast_precision_loss)]
        gauge!("sr_router_mailbox_depth").set(new_depth as f64);

        if new_depth > ROUTER_MAILBOX_WARNING {
            warn!(
                target: "sr.router.mailbox",
                depth = new_depth,
                threshold = ROUTER_MAILBOX_WARNING,
                "Router mailbox depth critical"
            );
        }
    }

    /// Record a message being removed from the mailbox (processed).
    pub fn record_dequeue(&self) {
        let new_depth = self.depth.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        #[allow(clippy::cast_precision_loss)]
        gauge!("sr_router_mailbox_depth").set(new_depth as f64);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Current mailbox depth.
    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Total messages processed.
    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }
}

/// Aggregated relay metrics, shared between the router actor and the
/// WebSocket layer.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Rooms currently in the store.
    active_rooms: AtomicUsize,
    /// Live connections.
    active_connections: AtomicUsize,
    /// Signaling messages relayed (offer/answer/ice-candidate).
    messages_relayed: AtomicU64,
}

impl RelayMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Increment the active room count.
    pub fn room_created(&self) {
        let count = self.active_rooms.fetch_add(1, Ordering::Relaxed) + 1;
        #[allow(clippy::cast_precision_loss)]
        gauge!("sr_rooms_active").set(count as f64);
    }

    /// Decrement the active room count.
    pub fn room_closed(&self) {
        let count = self
            .active_rooms
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        #[allow(clippy::cast_precision_loss)]
        gauge!("sr_rooms_active").set(count as f64);
    }

    /// Increment the live connection count.
    pub fn connection_opened(&self) {
        let count = self.active_connections.fetch_add(1, Ordering::Relaxed) + 1;
        #[allow(clippy::cast_precision_loss)]
        gauge!("sr_connections_active").set(count as f64);
    }

    /// Decrement the live connection count.
    pub fn connection_closed(&self) {
        let count = self
            .active_connections
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        #[allow(clippy::cast_precision_loss)]
        gauge!("sr_connections_active").set(count as f64);
    }

    /// Record one relayed signaling message.
    pub fn message_relayed(&self) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
        counter!("sr_messages_relayed_total").increment(1);
    }

    /// Current room count.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.active_rooms.load(Ordering::Relaxed)
    }

    /// Current connection count.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Total relayed messages.
    #[must_use]
    pub fn messages_relayed(&self) -> u64 {
        self.messages_relayed.load(Ordering::Relaxed)
    }
}
