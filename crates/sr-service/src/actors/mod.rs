//! Actor model for the signaling router.
//!
//! The relay runs a single router actor:
//!
//! ```text
//! RouterActor (singleton per relay instance)
//! ├── owns the RoomStore (all room state)
//! └── reaches connections via the GroupSender capability
//! ```
//!
//! Serializing every event through the router mailbox is what makes
//! concurrent join/disconnect on the same room safe: the store is mutated
//! by exactly one task.
//!
//! # Modules
//!
//! - [`router`] - `RouterActor` and its handle
//! - [`messages`] - message types for router communication
//! - [`metrics`] - mailbox monitoring and relay metrics

pub mod messages;
pub mod metrics;
pub mod router;

// Re-export primary types
pub use messages::{RoomSnapshot, RouterMessage, RouterStatus};
pub use metrics::{MailboxMonitor, RelayMetrics};
pub use router::{RouterActor, RouterActorHandle};
