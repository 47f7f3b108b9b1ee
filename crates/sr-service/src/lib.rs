//! TeleVisit Signaling Relay (SR) Service Library
//!
//! A real-time signaling relay for peer-to-peer audio/video sessions. A
//! patient creates a session room, a doctor joins it, and the relay
//! forwards the WebRTC negotiation messages (offer, answer, ice-candidate)
//! between them over persistent WebSocket connections. The relay carries
//! no media; once the handshake completes the peers talk directly.
//!
//! # Architecture
//!
//! ```text
//! RouterActor (singleton per relay instance)
//! ├── owns the RoomStore (room -> patient/doctor membership)
//! └── reaches connections via the GroupSender capability
//!     └── ChannelTransport (connection registry + broadcast groups)
//!         └── one WebSocket task pair per client (src/ws.rs)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single-task room state**: every event serializes through the router
//!   mailbox, so concurrent join/disconnect on the same room cannot race
//! - **Best-effort delivery**: relays and broadcasts are fire-and-forget;
//!   unknown targets and sends to vanished connections are swallowed
//! - **Transport behind a capability**: the router sees `send`/`join_group`/
//!   `leave_group`/`broadcast` only, so the state machine is testable
//!   without a live socket
//!
//! # Modules
//!
//! - [`actors`] - the router actor and its message types
//! - [`config`] - service configuration from environment
//! - [`errors`] - error types
//! - [`observability`] - health probes and Prometheus metrics
//! - [`protocol`] - the wire event vocabulary
//! - [`rooms`] - room membership state
//! - [`transport`] - connection registry and group fan-out
//! - [`ws`] - the WebSocket endpoint

pub mod actors;
pub mod config;
pub mod errors;
pub mod observability;
pub mod protocol;
pub mod rooms;
pub mod transport;
pub mod ws;
