use crate::admin::{MemberDescription, RoomDescription};
use crate::auth::Identity;
use crate::room::Room;
use presence_system::{CursorEvent, DiagramId, JoinError, ParticipantId, ParticipantInfo, Position};
use std::collections::HashMap;
use std::num::Wrapping;

pub type ConnectionId = u32;

#[derive(Debug)]
pub struct ConnectionEntry {
    pub credential: String,
    pub room: Option<DiagramId>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
    #[error("connection {0} has not joined a room")]
    NotInRoom(ConnectionId),
}

/// Outcome of a successful join.
#[derive(Debug)]
pub struct Joined {
    pub participant: ParticipantInfo,
    /// Snapshot for the joiner.
    pub others: Vec<ParticipantInfo>,
    /// Connections to notify about the joiner.
    pub peers: Vec<ConnectionId>,
}

/// Outcome of a connection leaving its room.
#[derive(Debug)]
pub struct Left {
    pub diagram_id: DiagramId,
    pub participant_id: ParticipantId,
    pub peers: Vec<ConnectionId>,
}

pub struct ServerState {
    connection_id_source: Wrapping<ConnectionId>,
    connections: HashMap<ConnectionId, ConnectionEntry>,
    pub rooms: HashMap<DiagramId, Room>,
    room_capacity: usize,
}

impl ServerState {
    pub fn new(room_capacity: usize) -> Self {
        Self {
            connection_id_source: Wrapping(0),
            connections: HashMap::new(),
            rooms: HashMap::new(),
            room_capacity,
        }
    }

    pub fn create_connection(&mut self, credential: String) -> ConnectionId {
        let connection_id = self.new_connection_id();
        self.connections.insert(
            connection_id,
            ConnectionEntry {
                credential,
                room: None,
            },
        );
        connection_id
    }

    pub fn connection(&self, connection_id: &ConnectionId) -> Option<&ConnectionEntry> {
        self.connections.get(connection_id)
    }

    /// Admits a verified connection to the room of `diagram_id`, creating the
    /// room on first join.
    pub fn join_room(
        &mut self,
        connection_id: &ConnectionId,
        diagram_id: DiagramId,
        identity: Identity,
    ) -> Result<Joined, JoinError> {
        let entry = self
            .connections
            .get_mut(connection_id)
            .ok_or(JoinError::CredentialRejected)?;
        if entry.room.is_some() {
            return Err(JoinError::AlreadyJoined);
        }

        let room = self
            .rooms
            .entry(diagram_id.clone())
            .or_insert_with(|| Room::new(diagram_id.clone()));
        if room.len() >= self.room_capacity {
            if room.is_empty() {
                self.rooms.remove(&diagram_id);
            }
            return Err(JoinError::RoomFull);
        }

        let others = room.snapshot_except(connection_id);
        let peers = room.connection_ids_except(connection_id);
        let participant = room.add(*connection_id, identity);
        entry.room = Some(diagram_id.clone());
        log::info!(
            "Connection {} joined diagram {} as {}",
            connection_id,
            diagram_id,
            participant.id
        );

        Ok(Joined {
            participant,
            others,
            peers,
        })
    }

    pub fn leave_room(&mut self, connection_id: &ConnectionId) -> Option<Left> {
        let diagram_id = self.connections.get_mut(connection_id)?.room.take()?;
        let room = self.rooms.get_mut(&diagram_id)?;
        let member = room.remove(connection_id)?;
        let peers = room.connection_ids_except(connection_id);
        if room.is_empty() {
            log::info!("Room for diagram {} is empty, removing it", diagram_id);
            self.rooms.remove(&diagram_id);
        }
        log::info!("Connection {} left diagram {}", connection_id, diagram_id);
        Some(Left {
            diagram_id,
            participant_id: member.info.id,
            peers,
        })
    }

    pub fn disconnect(&mut self, connection_id: &ConnectionId) -> Option<Left> {
        let left = self.leave_room(connection_id);
        self.connections.remove(connection_id);
        left
    }

    /// Builds the relay of a pointer sample and the connections it goes to.
    pub fn cursor_event(
        &self,
        connection_id: &ConnectionId,
        position: Position,
    ) -> Result<(CursorEvent, Vec<ConnectionId>), ServerError> {
        let entry = self
            .connections
            .get(connection_id)
            .ok_or(ServerError::UnknownConnection(*connection_id))?;
        let member = entry
            .room
            .as_ref()
            .and_then(|diagram_id| self.rooms.get(diagram_id))
            .and_then(|room| room.member(connection_id).map(|member| (room, member)));
        match member {
            Some((room, member)) => Ok((
                CursorEvent::new(&member.info, position),
                room.connection_ids_except(connection_id),
            )),
            None => Err(ServerError::NotInRoom(*connection_id)),
        }
    }

    pub fn describe_rooms(&self) -> Vec<RoomDescription> {
        let mut rooms = self
            .rooms
            .values()
            .map(|room| RoomDescription {
                diagram_id: room.diagram_id.clone(),
                members: room
                    .members()
                    .iter()
                    .map(|member| MemberDescription {
                        user_id: member.user_id.clone(),
                        participant: member.info.clone(),
                    })
                    .collect(),
            })
            .collect::<Vec<_>>();
        rooms.sort_by(|a, b| a.diagram_id.cmp(&b.diagram_id));
        rooms
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        loop {
            self.connection_id_source += Wrapping(1);
            if !self.connections.contains_key(&self.connection_id_source.0) {
                break self.connection_id_source.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str) -> Identity {
        Identity {
            user_id: name.to_lowercase(),
            display_name: name.into(),
        }
    }

    fn d1() -> DiagramId {
        DiagramId::parse("d1").unwrap()
    }

    #[test]
    fn it_remove_room_when_all_connections_disconnect() {
        let mut state = ServerState::new(8);
        let connection_id = state.create_connection("ann".into());
        state.join_room(&connection_id, d1(), identity("Ann")).expect("");
        state.disconnect(&connection_id).expect("");
        assert!(state.rooms.is_empty());
        assert!(state.connection(&connection_id).is_none());
    }

    #[test]
    fn it_snapshots_others_and_lists_peers() {
        let mut state = ServerState::new(8);
        let ann = state.create_connection("ann".into());
        let ben = state.create_connection("ben".into());
        let ann_joined = state.join_room(&ann, d1(), identity("Ann")).unwrap();
        assert!(ann_joined.others.is_empty());
        assert!(ann_joined.peers.is_empty());

        let ben_joined = state.join_room(&ben, d1(), identity("Ben")).unwrap();
        assert_eq!(ben_joined.others, vec![ann_joined.participant.clone()]);
        assert_eq!(ben_joined.peers, vec![ann]);

        let left = state.leave_room(&ann).unwrap();
        assert_eq!(left.participant_id, ann_joined.participant.id);
        assert_eq!(left.peers, vec![ben]);
        assert_eq!(state.rooms.get(&d1()).map(|room| room.len()), Some(1));
    }

    #[test]
    fn it_refuses_second_join_and_full_rooms() {
        let mut state = ServerState::new(1);
        let ann = state.create_connection("ann".into());
        let ben = state.create_connection("ben".into());
        state.join_room(&ann, d1(), identity("Ann")).unwrap();

        assert_eq!(
            state
                .join_room(&ann, DiagramId::parse("d2").unwrap(), identity("Ann"))
                .unwrap_err(),
            JoinError::AlreadyJoined
        );
        assert_eq!(
            state.join_room(&ben, d1(), identity("Ben")).unwrap_err(),
            JoinError::RoomFull
        );
        assert!(state.rooms.get(&DiagramId::parse("d2").unwrap()).is_none());
    }

    #[test]
    fn it_relays_cursor_only_for_members() {
        let mut state = ServerState::new(8);
        let ann = state.create_connection("ann".into());
        let ben = state.create_connection("ben".into());
        state.join_room(&ann, d1(), identity("Ann")).unwrap();

        assert!(matches!(
            state.cursor_event(&ben, Position::new(1.0, 2.0)),
            Err(ServerError::NotInRoom(_))
        ));

        state.join_room(&ben, d1(), identity("Ben")).unwrap();
        let (event, targets) = state.cursor_event(&ben, Position::new(1.0, 2.0)).unwrap();
        assert_eq!(event.display_name, "Ben");
        assert_eq!(event.position(), Position::new(1.0, 2.0));
        assert_eq!(targets, vec![ann]);
    }

    #[test]
    fn it_describes_members_with_their_user_ids() {
        let mut state = ServerState::new(8);
        let ann = state.create_connection("ann".into());
        let joined = state.join_room(&ann, d1(), identity("Ann")).unwrap();

        let rooms = state.describe_rooms();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].members[0].user_id, "ann");
        assert_eq!(rooms[0].members[0].participant, joined.participant);
    }

    #[test]
    fn connection_ids_skip_live_ones_after_wrapping() {
        let mut state = ServerState::new(8);
        let first = state.create_connection("a".into());
        assert_eq!(first, 1);

        state.connection_id_source = Wrapping(ConnectionId::MAX);
        assert_eq!(state.create_connection("b".into()), 0);
        assert_eq!(state.create_connection("c".into()), 2);
    }
}
