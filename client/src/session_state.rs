use crate::cursor_egress::CursorEgress;
use crate::cursor_ingress::apply_cursor;
use crate::membership::{MembershipState, RoomMembership};
use crate::presence_registry::PresenceRegistry;
use presence_system::{ClientMessage, DiagramId, ParticipantId, Position, ServerMessage};
use std::time::{Duration, Instant};

/// Presence state of one session, free of any I/O.
///
/// The channel task feeds it transport events and inbound messages and drains
/// outbound messages from it; the presentation side publishes pointer samples
/// and reads the registry.
#[derive(Debug)]
pub struct SessionState {
    membership: RoomMembership,
    registry: PresenceRegistry,
    egress: CursorEgress,
}

impl SessionState {
    pub fn new(diagram_id: DiagramId, throttle_window: Duration) -> Self {
        Self {
            membership: RoomMembership::new(diagram_id),
            registry: PresenceRegistry::new(),
            egress: CursorEgress::new(throttle_window),
        }
    }

    pub fn registry(&self) -> &PresenceRegistry {
        &self.registry
    }

    pub fn membership_state(&self) -> &MembershipState {
        self.membership.state()
    }

    pub fn self_id(&self) -> Option<&ParticipantId> {
        self.membership.self_id()
    }

    pub fn is_closed(&self) -> bool {
        *self.membership.state() == MembershipState::Closed
    }

    /// Transport is up; returns the join request to send.
    pub fn on_connected(&mut self) -> Option<ClientMessage> {
        self.membership.begin_join()
    }

    pub fn handle_server_message(&mut self, message: ServerMessage) {
        if self.is_closed() {
            return;
        }
        match message {
            ServerMessage::JoinAck(ack) => self.membership.handle_join_ack(ack, &mut self.registry),
            ServerMessage::ParticipantJoined(info) => self
                .membership
                .handle_participant_joined(info, &mut self.registry),
            ServerMessage::ParticipantLeft { id } => self
                .membership
                .handle_participant_left(&id, &mut self.registry),
            ServerMessage::Cursor(event) => apply_cursor(&self.membership, &mut self.registry, event),
        }
    }

    /// Local pointer sample in diagram space. Dropped unless joined.
    pub fn publish(&mut self, x: f64, y: f64, now: Instant) {
        if self.membership.is_joined() {
            self.egress.publish(Position::new(x, y), now);
        }
    }

    /// One flush attempt; called once per frame by the channel.
    pub fn poll_outbound(&mut self, now: Instant) -> Option<ClientMessage> {
        if self.membership.is_joined() {
            self.egress.poll(now)
        } else {
            None
        }
    }

    pub fn on_disconnected(&mut self) {
        self.egress.cancel();
        self.membership.handle_disconnect(&mut self.registry);
    }

    pub fn close(&mut self) {
        self.egress.cancel();
        self.membership.close(&mut self.registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_system::{Color, CursorEvent, JoinAck, ParticipantInfo};

    fn window() -> Duration {
        Duration::from_millis(80)
    }

    fn info(id: &str, name: &str, color: Color) -> ParticipantInfo {
        ParticipantInfo {
            id: ParticipantId::from(id),
            display_name: name.into(),
            color,
        }
    }

    fn accept(state: &mut SessionState, participants: Vec<ParticipantInfo>) {
        state.on_connected();
        state.handle_server_message(ServerMessage::JoinAck(JoinAck::Accepted {
            self_id: ParticipantId::from("a1"),
            participants,
        }));
    }

    fn d1() -> SessionState {
        SessionState::new(DiagramId::parse("d1").unwrap(), window())
    }

    #[test]
    fn registry_equals_snapshot_after_join() {
        let mut state = d1();
        let red = Color::new(0xff, 0, 0);
        let snapshot = vec![info("b1", "Bob", red), info("c1", "Cho", red)];
        accept(&mut state, snapshot.clone());

        let mut ids = state
            .registry()
            .iter()
            .map(|p| p.id.clone())
            .collect::<Vec<_>>();
        ids.sort();
        assert_eq!(
            ids,
            snapshot.into_iter().map(|p| p.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn duplicate_join_keeps_known_position() {
        let mut state = d1();
        let red = Color::new(0xff, 0, 0);
        accept(&mut state, vec![info("b1", "Bob", red)]);
        state.handle_server_message(ServerMessage::Cursor(CursorEvent {
            id: ParticipantId::from("b1"),
            display_name: "Bob".into(),
            color: red,
            x: 9.0,
            y: 9.0,
        }));
        state.handle_server_message(ServerMessage::ParticipantJoined(info("b1", "Bob", red)));

        let bob = state.registry().get(&ParticipantId::from("b1")).unwrap();
        assert_eq!(bob.position, Position::new(9.0, 9.0));
        assert_eq!(state.registry().len(), 1);
    }

    #[test]
    fn leave_removes_only_that_participant() {
        let mut state = d1();
        let red = Color::new(0xff, 0, 0);
        accept(&mut state, vec![info("b1", "Bob", red), info("c1", "Cho", red)]);
        state.handle_server_message(ServerMessage::ParticipantLeft {
            id: ParticipantId::from("b1"),
        });
        state.handle_server_message(ServerMessage::ParticipantLeft {
            id: ParticipantId::from("nobody"),
        });

        assert_eq!(state.registry().len(), 1);
        assert!(state.registry().contains(&ParticipantId::from("c1")));
    }

    #[test]
    fn publish_is_a_no_op_until_joined() {
        let base = Instant::now();
        let mut state = d1();
        state.publish(1.0, 1.0, base);
        assert_eq!(state.poll_outbound(base + window()), None);

        accept(&mut state, vec![]);
        state.publish(2.0, 3.0, base);
        assert_eq!(
            state.poll_outbound(base + window()),
            Some(ClientMessage::Cursor { x: 2.0, y: 3.0 })
        );
    }

    #[test]
    fn close_discards_pending_sample_and_freezes_registry() {
        let base = Instant::now();
        let mut state = d1();
        accept(&mut state, vec![info("b1", "Bob", Color::default())]);
        state.publish(2.0, 3.0, base);
        state.close();

        assert!(state.registry().is_empty());
        assert_eq!(state.poll_outbound(base + window()), None);

        state.handle_server_message(ServerMessage::ParticipantJoined(info(
            "c1",
            "Cho",
            Color::default(),
        )));
        assert!(state.registry().is_empty());
    }

    #[test]
    fn disconnect_clears_registry() {
        let mut state = d1();
        accept(&mut state, vec![info("b1", "Bob", Color::default())]);
        state.on_disconnected();
        assert!(state.registry().is_empty());
        assert_eq!(state.membership_state(), &MembershipState::Disconnected);
    }

    #[test]
    fn two_viewers_scenario() {
        let mut state = d1();
        let red: Color = "#ff0000".parse().unwrap();
        accept(&mut state, vec![]);
        assert!(state.registry().is_empty());

        state.handle_server_message(ServerMessage::ParticipantJoined(info("b1", "Bob", red)));
        let bob = state.registry().get(&ParticipantId::from("b1")).unwrap();
        assert_eq!(
            (bob.display_name.as_str(), bob.color, bob.position),
            ("Bob", red, Position::ORIGIN)
        );

        state.handle_server_message(ServerMessage::Cursor(CursorEvent {
            id: ParticipantId::from("b1"),
            display_name: "Bob".into(),
            color: red,
            x: 120.0,
            y: 45.0,
        }));
        assert_eq!(
            state
                .registry()
                .get(&ParticipantId::from("b1"))
                .map(|p| p.position),
            Some(Position::new(120.0, 45.0))
        );

        state.handle_server_message(ServerMessage::ParticipantLeft {
            id: ParticipantId::from("b1"),
        });
        assert!(state.registry().is_empty());
    }
}
