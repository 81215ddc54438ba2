use presence_system::{DiagramId, ParticipantInfo};
use serde::Serialize;
use tokio::sync::oneshot::Sender;

#[derive(Debug)]
pub enum AdminCommand {
    DescribeRooms { tx: Sender<Vec<RoomDescription>> },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDescription {
    pub diagram_id: DiagramId,
    pub members: Vec<MemberDescription>,
}

/// A room member as operators see it: the participant plus the durable user
/// behind its credential.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDescription {
    pub user_id: String,
    #[serde(flatten)]
    pub participant: ParticipantInfo,
}
