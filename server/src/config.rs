use clap::Parser;

/// Runtime settings of the presence server.
///
/// Every flag can also be given through the environment variable next to it.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "presence-server",
    about = "Room coordinator for live diagram presence",
    version
)]
pub struct ServerConfig {
    /// Address the HTTP/websocket listener binds to.
    #[arg(long, default_value = "127.0.0.1:8080", env = "PRESENCE_BIND")]
    pub bind: String,

    /// Maximum number of participants in one room.
    #[arg(long, default_value_t = 64, env = "PRESENCE_ROOM_CAPACITY")]
    pub room_capacity: usize,

    /// Capacity of the room broker's command queue.
    #[arg(long, default_value_t = 256, env = "PRESENCE_BROKER_BUFFER")]
    pub broker_buffer: usize,

    /// Origin allowed by CORS. Any origin is allowed when unset.
    #[arg(long, env = "PRESENCE_ALLOWED_ORIGIN")]
    pub allowed_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".into(),
            room_capacity: 64,
            broker_buffer: 256,
            allowed_origin: None,
        }
    }
}
