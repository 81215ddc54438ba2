use presence_system::{Color, CursorEvent, ParticipantId, ParticipantInfo, Position};
use std::collections::HashMap;

/// A remote viewer of the same diagram, as last seen locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub color: Color,
    pub position: Position,
}

impl Participant {
    /// Participant announced without a cursor sample yet.
    pub fn announced(info: ParticipantInfo) -> Self {
        Self {
            id: info.id,
            display_name: info.display_name,
            color: info.color,
            position: Position::ORIGIN,
        }
    }
}

impl From<CursorEvent> for Participant {
    fn from(event: CursorEvent) -> Self {
        let position = event.position();
        Self {
            id: event.id,
            display_name: event.display_name,
            color: event.color,
            position,
        }
    }
}

/// Local cache of all currently known remote participants.
///
/// Readable by anyone; writable only from inside this crate, where room
/// membership and cursor ingress are the sole callers of the mutators.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    participants: HashMap<ParticipantId, Participant>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.participants.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> + '_ {
        self.participants.values()
    }

    /// Owned copy of the current participants, in no particular order.
    pub fn participants(&self) -> Vec<Participant> {
        self.participants.values().cloned().collect()
    }

    pub(crate) fn replace_all(&mut self, participants: impl IntoIterator<Item = Participant>) {
        self.participants.clear();
        for participant in participants {
            self.participants.insert(participant.id.clone(), participant);
        }
    }

    /// Returns false, leaving the existing entry untouched, if the id is known.
    pub(crate) fn insert_if_absent(&mut self, participant: Participant) -> bool {
        if self.participants.contains_key(&participant.id) {
            return false;
        }
        self.participants.insert(participant.id.clone(), participant);
        true
    }

    pub(crate) fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        self.participants.remove(id)
    }

    /// Updates metadata and position in place, creating the entry when missing.
    pub(crate) fn upsert(&mut self, participant: Participant) {
        match self.participants.get_mut(&participant.id) {
            Some(existing) => {
                existing.display_name = participant.display_name;
                existing.color = participant.color;
                existing.position = participant.position;
            }
            None => {
                self.participants.insert(participant.id.clone(), participant);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.participants.clear();
    }
}
