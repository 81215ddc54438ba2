use crate::membership::RoomMembership;
use crate::presence_registry::{Participant, PresenceRegistry};
use presence_system::CursorEvent;

/// Applies a remote pointer sample. A sample for an id the registry does not
/// know yet creates the entry: cursors and joins travel independently, so a
/// cursor may overtake its `participant_joined`.
pub(crate) fn apply_cursor(
    membership: &RoomMembership,
    registry: &mut PresenceRegistry,
    event: CursorEvent,
) {
    let self_id = match membership.self_id() {
        Some(self_id) => self_id,
        None => {
            log::debug!("cursor ignored in state {:?}", membership.state());
            return;
        }
    };
    if event.id == *self_id {
        return;
    }
    if !event.position().is_finite() {
        log::warn!("dropping non-finite cursor from {}", event.id);
        return;
    }
    registry.upsert(Participant::from(event));
}
