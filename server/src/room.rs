use crate::auth::Identity;
use crate::server_state::ConnectionId;
use presence_system::{Color, DiagramId, ParticipantId, ParticipantInfo};

/// Marker colors handed out to room members, first unused wins.
pub const PALETTE: [Color; 12] = [
    Color::new(0xe6, 0x19, 0x4b),
    Color::new(0x3c, 0xb4, 0x4b),
    Color::new(0x43, 0x63, 0xd8),
    Color::new(0xf5, 0x82, 0x31),
    Color::new(0x91, 0x1e, 0xb4),
    Color::new(0x42, 0xd4, 0xf4),
    Color::new(0xf0, 0x32, 0xe6),
    Color::new(0xbf, 0xef, 0x45),
    Color::new(0x46, 0x99, 0x90),
    Color::new(0x9a, 0x63, 0x24),
    Color::new(0x80, 0x00, 0x00),
    Color::new(0x00, 0x00, 0x75),
];

#[derive(Debug, Clone)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub info: ParticipantInfo,
}

/// Connections currently viewing one diagram.
#[derive(Debug)]
pub struct Room {
    pub diagram_id: DiagramId,
    members: Vec<Member>,
}

impl Room {
    pub fn new(diagram_id: DiagramId) -> Self {
        Self {
            diagram_id,
            members: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, connection_id: &ConnectionId) -> Option<&Member> {
        self.members
            .iter()
            .find(|member| member.connection_id == *connection_id)
    }

    /// Everyone but `connection_id`.
    pub fn snapshot_except(&self, connection_id: &ConnectionId) -> Vec<ParticipantInfo> {
        self.members
            .iter()
            .filter(|member| member.connection_id != *connection_id)
            .map(|member| member.info.clone())
            .collect()
    }

    pub fn connection_ids_except(&self, connection_id: &ConnectionId) -> Vec<ConnectionId> {
        self.members
            .iter()
            .map(|member| member.connection_id)
            .filter(|id| id != connection_id)
            .collect()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn add(&mut self, connection_id: ConnectionId, identity: Identity) -> ParticipantInfo {
        let info = ParticipantInfo {
            id: self.allocate_id(),
            display_name: identity.display_name,
            color: self.allocate_color(),
        };
        self.members.push(Member {
            connection_id,
            user_id: identity.user_id,
            info: info.clone(),
        });
        info
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<Member> {
        self.members
            .iter()
            .position(|member| member.connection_id == *connection_id)
            .map(|pos| self.members.remove(pos))
    }

    fn allocate_id(&self) -> ParticipantId {
        loop {
            let id = ParticipantId::generate();
            if !self.members.iter().any(|member| member.info.id == id) {
                break id;
            }
        }
    }

    fn allocate_color(&self) -> Color {
        PALETTE
            .iter()
            .find(|color| !self.members.iter().any(|member| member.info.color == **color))
            .copied()
            .unwrap_or(PALETTE[self.members.len() % PALETTE.len()])
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

    #[test]
    fn it_hands_out_unused_colors_first() {
        let mut room = Room::new(DiagramId::parse("d1").unwrap());
        let first = room.add(1, identity("Ann"));
        let second = room.add(2, identity("Ben"));
        assert_eq!(first.color, PALETTE[0]);
        assert_eq!(second.color, PALETTE[1]);
        assert_ne!(first.id, second.id);

        room.remove(&1);
        let third = room.add(3, identity("Cy"));
        assert_eq!(third.color, PALETTE[0]);
    }

    #[test]
    fn it_cycles_palette_when_exhausted() {
        let mut room = Room::new(DiagramId::parse("d1").unwrap());
        for connection_id in 0..PALETTE.len() as ConnectionId {
            room.add(connection_id, identity("Someone"));
        }
        let extra = room.add(100, identity("Late"));
        assert_eq!(extra.color, PALETTE[0]);
    }

    #[test]
    fn snapshot_excludes_the_asking_connection() {
        let mut room = Room::new(DiagramId::parse("d1").unwrap());
        room.add(1, identity("Ann"));
        room.add(2, identity("Ben"));
        let snapshot = room.snapshot_except(&2);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].display_name, "Ann");
        assert_eq!(room.connection_ids_except(&2), vec![1]);
    }
}
