use crate::presence_registry::{Participant, PresenceRegistry};
use presence_system::{ClientMessage, DiagramId, JoinAck, JoinError, ParticipantId, ParticipantInfo};

#[derive(Debug, Clone, PartialEq)]
pub enum MembershipState {
    /// Transport not established yet.
    Connecting,
    /// `join` sent, waiting for the one and only ack.
    AwaitingAck,
    Joined { self_id: ParticipantId },
    Rejected(JoinError),
    Disconnected,
    Closed,
}

/// Room membership half of a session: the join handshake and the
/// joined/left notifications that follow it.
#[derive(Debug)]
pub struct RoomMembership {
    diagram_id: DiagramId,
    state: MembershipState,
}

impl RoomMembership {
    pub fn new(diagram_id: DiagramId) -> Self {
        Self {
            diagram_id,
            state: MembershipState::Connecting,
        }
    }

    pub fn state(&self) -> &MembershipState {
        &self.state
    }

    pub fn self_id(&self) -> Option<&ParticipantId> {
        match &self.state {
            MembershipState::Joined { self_id } => Some(self_id),
            _ => None,
        }
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.state, MembershipState::Joined { .. })
    }

    /// Produces the join request. Only the first call after connecting yields one.
    pub fn begin_join(&mut self) -> Option<ClientMessage> {
        if self.state != MembershipState::Connecting {
            log::warn!("join requested in state {:?}", self.state);
            return None;
        }
        self.state = MembershipState::AwaitingAck;
        Some(ClientMessage::Join {
            diagram_id: self.diagram_id.clone(),
        })
    }

    pub fn handle_join_ack(&mut self, ack: JoinAck, registry: &mut PresenceRegistry) {
        if self.state != MembershipState::AwaitingAck {
            log::warn!("unexpected join ack in state {:?}", self.state);
            return;
        }
        match ack {
            JoinAck::Rejected { error } => {
                log::warn!("join to diagram {} rejected: {}", self.diagram_id, error);
                registry.clear();
                self.state = MembershipState::Rejected(error);
            }
            JoinAck::Accepted {
                self_id,
                participants,
            } => {
                log::info!(
                    "joined diagram {} as {} with {} other participant(s)",
                    self.diagram_id,
                    self_id,
                    participants.len()
                );
                registry.replace_all(
                    participants
                        .into_iter()
                        .filter(|info| info.id != self_id)
                        .map(Participant::announced),
                );
                self.state = MembershipState::Joined { self_id };
            }
        }
    }

    pub fn handle_participant_joined(&self, info: ParticipantInfo, registry: &mut PresenceRegistry) {
        match self.self_id() {
            Some(self_id) if *self_id != info.id => {
                let id = info.id.clone();
                if !registry.insert_if_absent(Participant::announced(info)) {
                    log::debug!("participant {} already known", id);
                }
            }
            Some(_) => {}
            None => log::debug!("participant_joined ignored in state {:?}", self.state),
        }
    }

    pub fn handle_participant_left(&self, id: &ParticipantId, registry: &mut PresenceRegistry) {
        if !self.is_joined() {
            log::debug!("participant_left ignored in state {:?}", self.state);
            return;
        }
        if registry.remove(id).is_none() {
            log::debug!("participant {} left before being known", id);
        }
    }

    pub fn handle_disconnect(&mut self, registry: &mut PresenceRegistry) {
        registry.clear();
        if self.state != MembershipState::Closed {
            self.state = MembershipState::Disconnected;
        }
    }

    pub fn close(&mut self, registry: &mut PresenceRegistry) {
        registry.clear();
        self.state = MembershipState::Closed;
    }
}
