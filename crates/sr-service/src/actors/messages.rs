//! Message types for router actor communication.
//!
//! All communication with the router uses strongly-typed message passing
//! via `tokio::sync::mpsc`; request-reply patterns use `tokio::sync::oneshot`.

use crate::protocol::ClientEvent;
use tokio::sync::oneshot;

/// Messages sent to the `RouterActor`.
#[derive(Debug)]
pub enum RouterMessage {
    /// A decoded protocol event arrived on a connection.
    Event {
        connection_id: String,
        event: ClientEvent,
    },

    /// The transport reported a connection gone; run room cleanup.
    Disconnected { connection_id: String },

    /// Get current router status (for health/debugging).
    GetStatus {
        /// Response channel for router status.
        respond_to: oneshot::Sender<RouterStatus>,
    },

    /// Get a snapshot of one room's membership.
    GetRoom {
        room_id: String,
        /// Response channel; `None` when the room does not exist.
        respond_to: oneshot::Sender<Option<RoomSnapshot>>,
    },
}

/// Status of the `RouterActor`.
#[derive(Debug, Clone)]
pub struct RouterStatus {
    /// Rooms currently in the store.
    pub room_count: usize,
    /// Current mailbox depth.
    pub mailbox_depth: usize,
}

/// Point-in-time view of one room's membership.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    /// Room id.
    pub room_id: String,
    /// Patient connection ids, sorted.
    pub patients: Vec<String>,
    /// Doctor connection ids, sorted.
    pub doctors: Vec<String>,
    /// Creation timestamp (unix seconds).
    pub created_at: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_room_snapshot_clone() {
        let snapshot = RoomSnapshot {
            room_id: "r1".to_string(),
            patients: vec!["c1".to_string()],
            doctors: vec![],
            created_at: 0,
        };
        let cloned = snapshot.clone();
        assert_eq!(snapshot.room_id, cloned.room_id);
        assert_eq!(snapshot.patients, cloned.patients);
    }
}
