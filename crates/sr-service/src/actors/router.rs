//! `RouterActor` - the signaling router, sole owner of the room store.
//!
//! One router task serves the whole relay. Every inbound protocol event and
//! every disconnect is a message through its mailbox, so concurrent
//! join/leave races on shared room state serialize here: all room-store
//! access happens on one logical task, never under a lock.
//!
//! The router reaches connections only through the [`GroupSender`]
//! capability; it has no knowledge of sockets.

use crate::errors::RelayError;
use crate::protocol::{candidate_payload, relay_target, ClientEvent, ServerEvent};
use crate::rooms::{Room, RoomStore};
use crate::transport::GroupSender;

use super::messages::{RoomSnapshot, RouterMessage, RouterStatus};
use super::metrics::{MailboxMonitor, RelayMetrics};

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Channel buffer size for the router mailbox.
const ROUTER_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `RouterActor`.
///
/// This is the public interface for the transport layer (and tests).
#[derive(Clone)]
pub struct RouterActorHandle {
    sender: mpsc::Sender<RouterMessage>,
    cancel_token: CancellationToken,
}

impl RouterActorHandle {
    /// Spawn the router actor and return a handle plus its join handle.
    #[must_use]
    pub fn spawn(
        relay_id: String,
        transport: Arc<dyn GroupSender>,
        metrics: Arc<RelayMetrics>,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROUTER_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RouterActor {
            relay_id,
            receiver,
            cancel_token: cancel_token.clone(),
            store: RoomStore::new(),
            transport,
            metrics,
            mailbox: MailboxMonitor::new(),
        };

        let task_handle = tokio::spawn(actor.run());

        (
            Self {
                sender,
                cancel_token,
            },
            task_handle,
        )
    }

    /// Deliver a decoded protocol event from a connection.
    pub async fn client_event(
        &self,
        connection_id: String,
        event: ClientEvent,
    ) -> Result<(), RelayError> {
        self.sender
            .send(RouterMessage::Event {
                connection_id,
                event,
            })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))
    }

    /// Notify the router of a transport-level disconnect.
    pub async fn disconnected(&self, connection_id: String) -> Result<(), RelayError> {
        self.sender
            .send(RouterMessage::Disconnected { connection_id })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))
    }

    /// Get current router status.
    pub async fn status(&self) -> Result<RouterStatus, RelayError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RouterMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))
    }

    /// Get a snapshot of one room, or `None` if it does not exist.
    pub async fn room(&self, room_id: String) -> Result<Option<RoomSnapshot>, RelayError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RouterMessage::GetRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the router actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for tasks that should stop with the router.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// The `RouterActor` implementation.
pub struct RouterActor {
    /// Relay instance id.
    relay_id: String,
    /// Message receiver.
    receiver: mpsc::Receiver<RouterMessage>,
    /// Cancellation token (root).
    cancel_token: CancellationToken,
    /// Room store, owned exclusively by this task.
    store: RoomStore,
    /// Transport capability for sends and group fan-out.
    transport: Arc<dyn GroupSender>,
    /// Shared relay metrics.
    metrics: Arc<RelayMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl RouterActor {
    /// Run the actor message loop.
    #[instrument(skip_all, name = "sr.actor.router", fields(relay_id = %self.relay_id))]
    async fn run(mut self) {
        info!(
            target: "sr.actor.router",
            relay_id = %self.relay_id,
            "RouterActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "sr.actor.router",
                        relay_id = %self.relay_id,
                        "RouterActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message);
                            self.mailbox.record_dequeue();
                        }
                        None => {
                            info!(
                                target: "sr.actor.router",
                                relay_id = %self.relay_id,
                                "RouterActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "sr.actor.router",
            relay_id = %self.relay_id,
            rooms_remaining = self.store.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RouterActor stopped"
        );
    }

    /// Handle a single message.
    fn handle_message(&mut self, message: RouterMessage) {
        match message {
            RouterMessage::Event {
                connection_id,
                event,
            } => match event {
                ClientEvent::CreateRoom(room_id) => self.handle_create_room(&connection_id, room_id),
                ClientEvent::JoinRoom(room_id) => self.handle_join_room(&connection_id, &room_id),
                ClientEvent::Offer(payload) => self.handle_relay(&connection_id, payload, true),
                ClientEvent::Answer(payload) => self.handle_relay(&connection_id, payload, false),
                ClientEvent::IceCandidate(payload) => {
                    self.handle_ice_candidate(&connection_id, payload);
                }
            },

            RouterMessage::Disconnected { connection_id } => {
                self.handle_disconnect(&connection_id);
            }

            RouterMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(RouterStatus {
                    room_count: self.store.len(),
                    mailbox_depth: self.mailbox.current_depth(),
                });
            }

            RouterMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.snapshot_room(&room_id));
            }
        }
    }

    /// Patient creates a room. Overwrites any existing room of the same id,
    /// discarding prior membership; last writer wins.
    fn handle_create_room(&mut self, connection_id: &str, room_id: String) {
        let displaced = self.store.put(room_id.clone(), Room::for_patient(connection_id));
        match displaced {
            None => self.metrics.room_created(),
            Some(old) => {
                warn!(
                    target: "sr.router",
                    room_id = %room_id,
                    displaced_patients = old.patients.len(),
                    displaced_doctors = old.doctors.len(),
                    "Room overwritten, prior membership discarded"
                );
            }
        }

        self.transport.join_group(connection_id, &room_id);
        self.transport
            .send(connection_id, ServerEvent::RoomCreated(room_id.clone()));

        info!(
            target: "sr.router",
            room_id = %room_id,
            connection_id = %connection_id,
            "Room created by patient"
        );
    }

    /// Doctor joins a room. An unknown room id is a normal protocol
    /// outcome answered with `room-not-found`, not an error.
    fn handle_join_room(&mut self, connection_id: &str, room_id: &str) {
        if let Some(room) = self.store.get_mut(room_id) {
            room.doctors.insert(connection_id.to_string());
            self.transport.join_group(connection_id, room_id);
            self.transport.broadcast(
                room_id,
                ServerEvent::DoctorJoined(connection_id.to_string()),
            );

            info!(
                target: "sr.router",
                room_id = %room_id,
                connection_id = %connection_id,
                "Doctor joined room"
            );
        } else {
            self.transport.send(connection_id, ServerEvent::RoomNotFound);
            debug!(
                target: "sr.router",
                room_id = %room_id,
                connection_id = %connection_id,
                "Join attempt on unknown room"
            );
        }
    }

    /// Relay an offer or answer verbatim to `payload.target`. Unknown
    /// targets are dropped by the transport; no validation here.
    fn handle_relay(&self, connection_id: &str, payload: Value, is_offer: bool) {
        let Some(target) = relay_target(&payload).map(str::to_string) else {
            warn!(
                target: "sr.router",
                connection_id = %connection_id,
                "Dropping relay frame without a target"
            );
            return;
        };

        self.metrics.message_relayed();
        let event = if is_offer {
            ServerEvent::Offer(payload)
        } else {
            ServerEvent::Answer(payload)
        };
        self.transport.send(&target, event);
    }

    /// Forward only the `candidate` subfield of an ICE frame; the target
    /// field is consumed by the relay and not re-sent to the peer.
    fn handle_ice_candidate(&self, connection_id: &str, payload: Value) {
        let Some(target) = relay_target(&payload).map(str::to_string) else {
            warn!(
                target: "sr.router",
                connection_id = %connection_id,
                "Dropping ice-candidate frame without a target"
            );
            return;
        };
        let Some(candidate) = candidate_payload(&payload) else {
            warn!(
                target: "sr.router",
                connection_id = %connection_id,
                "Dropping ice-candidate frame without a candidate"
            );
            return;
        };

        self.metrics.message_relayed();
        self.transport.send(&target, ServerEvent::IceCandidate(candidate));
    }

    /// Disconnect cleanup: scan every room, remove the connection from
    /// both membership sets, broadcast `doctor-left` when a doctor was
    /// removed, and delete the room afterwards iff both sets are empty.
    ///
    /// A connection may be a member of zero, one, or many rooms, so the
    /// scan never short-circuits. Invoked twice for the same connection,
    /// the second pass finds nothing to remove and broadcasts nothing.
    fn handle_disconnect(&mut self, connection_id: &str) {
        for room_id in self.store.room_ids() {
            let Some(room) = self.store.get_mut(&room_id) else {
                continue;
            };

            let was_patient = room.patients.remove(connection_id);
            let was_doctor = room.doctors.remove(connection_id);
            let now_empty = room.is_empty();

            if was_patient || was_doctor {
                self.transport.leave_group(connection_id, &room_id);
                debug!(
                    target: "sr.router",
                    room_id = %room_id,
                    connection_id = %connection_id,
                    was_patient = was_patient,
                    was_doctor = was_doctor,
                    "Connection removed from room"
                );
            }

            // The broadcast goes out before the emptiness check deletes the
            // room, so remaining members hear it before group teardown.
            if was_doctor {
                self.transport.broadcast(&room_id, ServerEvent::DoctorLeft);
            }

            if now_empty {
                self.store.delete(&room_id);
                self.metrics.room_closed();
                info!(
                    target: "sr.router",
                    room_id = %room_id,
                    "Room deleted, last member gone"
                );
            }
        }
    }

    fn snapshot_room(&self, room_id: &str) -> Option<RoomSnapshot> {
        let room = self.store.get(room_id)?;
        let mut patients: Vec<String> = room.patients.iter().cloned().collect();
        let mut doctors: Vec<String> = room.doctors.iter().cloned().collect();
        patients.sort();
        doctors.sort();

        Some(RoomSnapshot {
            room_id: room_id.to_string(),
            patients,
            doctors,
            created_at: room.created_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use serde_json::json;

    struct TestRig {
        handle: RouterActorHandle,
        transport: Arc<ChannelTransport>,
    }

    fn rig() -> TestRig {
        let transport = Arc::new(ChannelTransport::new());
        let metrics = RelayMetrics::new();
        let (handle, _task) = RouterActorHandle::spawn(
            "sr-test".to_string(),
            Arc::clone(&transport) as Arc<dyn GroupSender>,
            metrics,
        );
        TestRig { handle, transport }
    }

    fn connect(rig: &TestRig, id: &str) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        rig.transport.register(id, tx);
        rx
    }

    /// Round-trip through the mailbox so earlier events are processed.
    async fn flush(rig: &TestRig) {
        let _ = rig.handle.status().await.unwrap();
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_create_room_confirms_to_creator() {
        let rig = rig();
        let mut rx = connect(&rig, "c1");

        rig.handle
            .client_event("c1".to_string(), ClientEvent::CreateRoom("r1".to_string()))
            .await
            .unwrap();
        flush(&rig).await;

        assert_eq!(
            drain(&mut rx),
            vec![ServerEvent::RoomCreated("r1".to_string())]
        );

        let snapshot = rig.handle.room("r1".to_string()).await.unwrap().unwrap();
        assert_eq!(snapshot.patients, vec!["c1".to_string()]);
        assert!(snapshot.doctors.is_empty());
    }

    #[tokio::test]
    async fn test_create_room_overwrite_discards_membership() {
        let rig = rig();
        let _rx1 = connect(&rig, "c1");
        let _rx2 = connect(&rig, "c2");

        rig.handle
            .client_event("c1".to_string(), ClientEvent::CreateRoom("r1".to_string()))
            .await
            .unwrap();
        rig.handle
            .client_event("c2".to_string(), ClientEvent::CreateRoom("r1".to_string()))
            .await
            .unwrap();
        flush(&rig).await;

        let snapshot = rig.handle.room("r1".to_string()).await.unwrap().unwrap();
        assert_eq!(snapshot.patients, vec!["c2".to_string()]);

        let status = rig.handle.status().await.unwrap();
        assert_eq!(status.room_count, 1);
    }

    #[tokio::test]
    async fn test_join_room_broadcasts_to_everyone_including_joiner() {
        let rig = rig();
        let mut rx1 = connect(&rig, "c1");
        let mut rx2 = connect(&rig, "c2");

        rig.handle
            .client_event("c1".to_string(), ClientEvent::CreateRoom("r1".to_string()))
            .await
            .unwrap();
        rig.handle
            .client_event("c2".to_string(), ClientEvent::JoinRoom("r1".to_string()))
            .await
            .unwrap();
        flush(&rig).await;

        let joined = ServerEvent::DoctorJoined("c2".to_string());
        assert_eq!(
            drain(&mut rx1),
            vec![ServerEvent::RoomCreated("r1".to_string()), joined.clone()]
        );
        assert_eq!(drain(&mut rx2), vec![joined]);
    }

    #[tokio::test]
    async fn test_join_unknown_room_yields_not_found_and_no_state() {
        let rig = rig();
        let mut rx = connect(&rig, "c1");

        rig.handle
            .client_event("c1".to_string(), ClientEvent::JoinRoom("ghost".to_string()))
            .await
            .unwrap();
        flush(&rig).await;

        assert_eq!(drain(&mut rx), vec![ServerEvent::RoomNotFound]);

        let status = rig.handle.status().await.unwrap();
        assert_eq!(status.room_count, 0);
        assert!(rig.handle.room("ghost".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offer_relayed_verbatim_to_target_only() {
        let rig = rig();
        let mut rx1 = connect(&rig, "c1");
        let mut rx2 = connect(&rig, "c2");

        let payload = json!({"target": "c2", "sdp": "v=0", "trickle": true});
        rig.handle
            .client_event("c1".to_string(), ClientEvent::Offer(payload.clone()))
            .await
            .unwrap();
        flush(&rig).await;

        assert_eq!(drain(&mut rx2), vec![ServerEvent::Offer(payload)]);
        assert!(drain(&mut rx1).is_empty());
    }

    #[tokio::test]
    async fn test_offer_to_unknown_target_does_not_fail_sender() {
        let rig = rig();
        let mut rx = connect(&rig, "c1");

        rig.handle
            .client_event(
                "c1".to_string(),
                ClientEvent::Offer(json!({"target": "ghost", "sdp": "v=0"})),
            )
            .await
            .unwrap();
        flush(&rig).await;

        // Silently dropped; the sender's connection sees nothing.
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_ice_candidate_forwards_candidate_subfield_only() {
        let rig = rig();
        let mut rx2 = connect(&rig, "c2");

        rig.handle
            .client_event(
                "c1".to_string(),
                ClientEvent::IceCandidate(
                    json!({"target": "c2", "candidate": "cand1", "extra": "ignored"}),
                ),
            )
            .await
            .unwrap();
        flush(&rig).await;

        assert_eq!(
            drain(&mut rx2),
            vec![ServerEvent::IceCandidate(json!("cand1"))]
        );
    }

    #[tokio::test]
    async fn test_malformed_relay_frames_are_dropped() {
        let rig = rig();
        let mut rx = connect(&rig, "c1");

        rig.handle
            .client_event("c1".to_string(), ClientEvent::Offer(json!({"sdp": "v=0"})))
            .await
            .unwrap();
        rig.handle
            .client_event(
                "c1".to_string(),
                ClientEvent::IceCandidate(json!({"target": "c1"})),
            )
            .await
            .unwrap();
        flush(&rig).await;

        assert!(drain(&mut rx).is_empty());
        // Router is still healthy.
        assert_eq!(rig.handle.status().await.unwrap().room_count, 0);
    }

    #[tokio::test]
    async fn test_doctor_disconnect_broadcasts_doctor_left_once() {
        let rig = rig();
        let mut rx1 = connect(&rig, "c1");
        let _rx2 = connect(&rig, "c2");

        rig.handle
            .client_event("c1".to_string(), ClientEvent::CreateRoom("r1".to_string()))
            .await
            .unwrap();
        rig.handle
            .client_event("c2".to_string(), ClientEvent::JoinRoom("r1".to_string()))
            .await
            .unwrap();

        rig.transport.unregister("c2");
        rig.handle.disconnected("c2".to_string()).await.unwrap();
        flush(&rig).await;

        let events = drain(&mut rx1);
        let left_count = events
            .iter()
            .filter(|e| matches!(e, ServerEvent::DoctorLeft))
            .count();
        assert_eq!(left_count, 1);

        // Patient remains; room survives.
        let snapshot = rig.handle.room("r1".to_string()).await.unwrap().unwrap();
        assert_eq!(snapshot.patients, vec!["c1".to_string()]);
        assert!(snapshot.doctors.is_empty());
    }

    #[tokio::test]
    async fn test_room_deleted_when_both_sets_empty() {
        let rig = rig();
        let _rx1 = connect(&rig, "c1");
        let _rx2 = connect(&rig, "c2");

        rig.handle
            .client_event("c1".to_string(), ClientEvent::CreateRoom("r1".to_string()))
            .await
            .unwrap();
        rig.handle
            .client_event("c2".to_string(), ClientEvent::JoinRoom("r1".to_string()))
            .await
            .unwrap();

        rig.handle.disconnected("c2".to_string()).await.unwrap();
        rig.handle.disconnected("c1".to_string()).await.unwrap();
        flush(&rig).await;

        assert!(rig.handle.room("r1".to_string()).await.unwrap().is_none());
        assert_eq!(rig.handle.status().await.unwrap().room_count, 0);
    }

    #[tokio::test]
    async fn test_disconnect_cleanup_is_idempotent() {
        let rig = rig();
        let mut rx1 = connect(&rig, "c1");
        let _rx2 = connect(&rig, "c2");

        rig.handle
            .client_event("c1".to_string(), ClientEvent::CreateRoom("r1".to_string()))
            .await
            .unwrap();
        rig.handle
            .client_event("c2".to_string(), ClientEvent::JoinRoom("r1".to_string()))
            .await
            .unwrap();
        flush(&rig).await;
        drain(&mut rx1);

        rig.handle.disconnected("c2".to_string()).await.unwrap();
        rig.handle.disconnected("c2".to_string()).await.unwrap();
        flush(&rig).await;

        let left_count = drain(&mut rx1)
            .iter()
            .filter(|e| matches!(e, ServerEvent::DoctorLeft))
            .count();
        assert_eq!(left_count, 1);
    }

    #[tokio::test]
    async fn test_disconnect_scans_every_room() {
        let rig = rig();
        let _rx1 = connect(&rig, "c1");
        let _rx2 = connect(&rig, "c2");

        // c1 is a patient in two rooms at once.
        rig.handle
            .client_event("c1".to_string(), ClientEvent::CreateRoom("r1".to_string()))
            .await
            .unwrap();
        rig.handle
            .client_event("c1".to_string(), ClientEvent::CreateRoom("r2".to_string()))
            .await
            .unwrap();
        // c2 keeps r2 alive after c1 leaves.
        rig.handle
            .client_event("c2".to_string(), ClientEvent::JoinRoom("r2".to_string()))
            .await
            .unwrap();

        rig.handle.disconnected("c1".to_string()).await.unwrap();
        flush(&rig).await;

        assert!(rig.handle.room("r1".to_string()).await.unwrap().is_none());
        let r2 = rig.handle.room("r2".to_string()).await.unwrap().unwrap();
        assert!(r2.patients.is_empty());
        assert_eq!(r2.doctors, vec!["c2".to_string()]);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let rig = rig();
        assert!(!rig.handle.is_cancelled());

        let child = rig.handle.child_token();
        rig.handle.cancel();
        assert!(rig.handle.is_cancelled());
        assert!(child.is_cancelled());
    }
}
