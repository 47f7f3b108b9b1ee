//! Wire protocol for the signaling relay.
//!
//! Frames are JSON text messages of the shape `{"event": <name>, "data": <payload>}`.
//! Inbound and outbound vocabularies are closed enums so the router's
//! state machine is exhaustive: an unknown event name fails to decode and
//! is dropped at the transport edge, it never reaches the router.
//!
//! `offer` and `answer` carry their payload as raw [`serde_json::Value`]
//! because the negotiation protocol may attach metadata beyond the session
//! description; the relay forwards the whole payload untouched.
//! `ice-candidate` is the deliberate exception: the relay consumes the
//! `target` field and forwards only the `candidate` subfield.

use crate::errors::RelayError;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events a client sends to the relay.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Patient creates (or overwrites) a room.
    CreateRoom(String),
    /// Doctor joins an existing room.
    JoinRoom(String),
    /// SDP offer, relayed verbatim to `data.target`.
    Offer(Value),
    /// SDP answer, relayed verbatim to `data.target`.
    Answer(Value),
    /// ICE candidate; only `data.candidate` is forwarded to `data.target`.
    IceCandidate(Value),
}

/// Events the relay sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Greeting carrying the connection's relay-assigned id.
    Connected(String),
    /// Room creation confirmation, sent to the creator only.
    RoomCreated(String),
    /// A doctor joined; broadcast to the room, payload is the doctor's
    /// connection id.
    DoctorJoined(String),
    /// Join attempt against an unknown room id, sent to the joiner only.
    RoomNotFound,
    /// Relayed offer (full original payload).
    Offer(Value),
    /// Relayed answer (full original payload).
    Answer(Value),
    /// Relayed ICE candidate (candidate subfield only).
    IceCandidate(Value),
    /// A doctor disconnected; broadcast to the affected room.
    DoctorLeft,
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns [`RelayError::MalformedEvent`] when the frame is not valid JSON
/// or names an event outside the vocabulary. Callers drop such frames.
pub fn decode_frame(text: &str) -> Result<ClientEvent, RelayError> {
    serde_json::from_str(text).map_err(|e| RelayError::MalformedEvent(e.to_string()))
}

/// Extract the relay target from an `offer`/`answer`/`ice-candidate` payload.
///
/// Returns `None` when the payload has no string `target` field, which the
/// router treats as a malformed frame.
#[must_use]
pub fn relay_target(payload: &Value) -> Option<&str> {
    payload.get("target")?.as_str()
}

/// Extract the `candidate` subfield from an `ice-candidate` payload.
#[must_use]
pub fn candidate_payload(payload: &Value) -> Option<Value> {
    payload.get("candidate").cloned()
}
