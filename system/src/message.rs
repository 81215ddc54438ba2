use crate::types::{Color, DiagramId, ParticipantId, Position};
use serde::{Deserialize, Serialize};

/// Messages a client sends over its channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Join { diagram_id: DiagramId },
    Cursor { x: f64, y: f64 },
}

/// Messages the room coordinator sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMessage {
    JoinAck(JoinAck),
    ParticipantJoined(ParticipantInfo),
    ParticipantLeft { id: ParticipantId },
    Cursor(CursorEvent),
}

/// The single answer to a `join`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinAck {
    Rejected {
        error: JoinError,
    },
    /// `participants` never contains the caller, whose own id is `self_id`.
    #[serde(rename_all = "camelCase")]
    Accepted {
        self_id: ParticipantId,
        participants: Vec<ParticipantInfo>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum JoinError {
    #[error("diagram is inaccessible")]
    DiagramInaccessible,
    #[error("credential was rejected")]
    CredentialRejected,
    #[error("connection already joined a room")]
    AlreadyJoined,
    #[error("room is full")]
    RoomFull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub id: ParticipantId,
    pub display_name: String,
    pub color: Color,
}

/// A remote pointer sample, relayed with the sender's metadata so that it can
/// stand on its own when it overtakes the matching `participant_joined`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorEvent {
    pub id: ParticipantId,
    pub display_name: String,
    pub color: Color,
    pub x: f64,
    pub y: f64,
}

impl CursorEvent {
    pub fn new(participant: &ParticipantInfo, position: Position) -> Self {
        Self {
            id: participant.id.clone(),
            display_name: participant.display_name.clone(),
            color: participant.color,
            x: position.x,
            y: position.y,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}
