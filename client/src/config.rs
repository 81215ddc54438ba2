use crate::cursor_egress::DEFAULT_THROTTLE_WINDOW;
use presence_system::WireFormat;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Websocket endpoint of the room coordinator, e.g. `ws://127.0.0.1:8080/ws`.
    pub server_url: String,
    /// Minimum interval between two outbound cursor messages.
    pub throttle_window: Duration,
    /// Pace of flush attempts; one per rendered frame.
    pub frame_interval: Duration,
    pub connect_timeout: Duration,
    pub wire_format: WireFormat,
}

impl ChannelConfig {
    pub fn with_server_url(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/ws".into(),
            throttle_window: DEFAULT_THROTTLE_WINDOW,
            frame_interval: Duration::from_millis(16),
            connect_timeout: Duration::from_secs(5),
            wire_format: WireFormat::Binary,
        }
    }
}
