//! Client side of diagram presence: who else is viewing the diagram and where
//! their pointers are.

pub mod channel;
mod config;
mod cursor_egress;
mod cursor_ingress;
mod membership;
mod presence_client;
mod presence_registry;
mod session_state;
pub mod transform;

pub use channel::{open, ChannelError, ChannelHandle, ChannelStatus, CredentialProvider, PresenceView};
pub use config::ChannelConfig;
pub use cursor_egress::{CursorEgress, CursorThrottle, ThrottleState, DEFAULT_THROTTLE_WINDOW};
pub use membership::{MembershipState, RoomMembership};
pub use presence_client::PresenceClient;
pub use presence_registry::{Participant, PresenceRegistry};
pub use session_state::SessionState;
pub use transform::{DiagramPoint, ScreenPoint, Viewport, ViewportError};
